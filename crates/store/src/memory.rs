//! In-memory table for tests and embedding

use crate::error::StoreError;
use crate::table::{ItemKey, Table, WriteOp};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Ordered in-memory item table
#[derive(Default)]
pub struct MemoryTable {
    items: RwLock<BTreeMap<ItemKey, Value>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Table for MemoryTable {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Value>, StoreError> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn query_items(&self, ledger: &str, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        let start = ItemKey::new(ledger, prefix);
        Ok(items
            .range(start..)
            .take_while(|(key, _)| key.ledger == ledger && key.entry.starts_with(prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn put_item(&self, item: Value) -> Result<(), StoreError> {
        let key = ItemKey::of(&item)?;
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;
        items.insert(key, item);
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;
        items.remove(key);
        Ok(())
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;

        let mut keys = Vec::with_capacity(ops.len());
        for op in &ops {
            let key = op.key()?;
            if let Some(condition) = op.condition() {
                if !condition.holds(items.get(&key)) {
                    return Err(StoreError::ConditionFailed(key.to_string()));
                }
            }
            keys.push(key);
        }

        for (op, key) in ops.into_iter().zip(keys) {
            match op {
                WriteOp::Put { item, .. } => {
                    items.insert(key, item);
                }
                WriteOp::Delete { .. } => {
                    items.remove(&key);
                }
            }
        }

        Ok(())
    }
}
