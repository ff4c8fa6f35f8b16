//! Ledger view over the item table
//!
//! Every record of a ledger lives in the ledger's partition:
//!
//! | entry              | record              |
//! |--------------------|---------------------|
//! | `pk`               | `KeyRecord`         |
//! | `parameters`       | `SystemParameters`  |
//! | `pending`          | pending `Entry`     |
//! | `current`          | current `Entry`     |
//! | `/<date>/<seq>/<uid>` | archived `Entry` |

use crate::error::StoreError;
use crate::table::{Condition, ItemKey, Table, WriteOp, ENTRY_FIELD, LEDGER_FIELD};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use sumsy_ledger::{
    Entry, KeyRecord, SystemParameters, ARCHIVE_PREFIX, CURRENT, KEYS, PARAMETERS, PENDING, SYSTEM,
};

/// Default page size of `recent_history`
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Fields dropped by the short projection
const HEAVY_FIELDS: [&str; 2] = ["signature", "counterSignature"];

/// Read/write access to ledger records
#[derive(Clone)]
pub struct Ledgers {
    table: Arc<dyn Table>,
    history_limit: usize,
    short: bool,
}

impl Ledgers {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self {
            table,
            history_limit: DEFAULT_HISTORY_LIMIT,
            short: false,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Same view without signatures, for list views
    pub fn short(&self) -> Self {
        Self {
            short: true,
            ..self.clone()
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub async fn current(&self, ledger: &str) -> Result<Option<Entry>, StoreError> {
        self.entry(ledger, CURRENT).await
    }

    pub async fn pending(&self, ledger: &str) -> Result<Option<Entry>, StoreError> {
        self.entry(ledger, PENDING).await
    }

    pub async fn entry(&self, ledger: &str, discriminator: &str) -> Result<Option<Entry>, StoreError> {
        let item = self.table.get_item(&ItemKey::new(ledger, discriminator)).await?;
        item.map(|item| self.decode(item)).transpose()
    }

    pub async fn keys(&self, ledger: &str) -> Result<Option<KeyRecord>, StoreError> {
        let item = self.table.get_item(&ItemKey::new(ledger, KEYS)).await?;
        item.map(from_item).transpose()
    }

    pub async fn parameters(&self) -> Result<Option<SystemParameters>, StoreError> {
        let item = self.table.get_item(&ItemKey::new(SYSTEM, PARAMETERS)).await?;
        item.map(from_item).transpose()
    }

    /// Current entry followed by archived entries, newest first
    pub async fn recent_history(&self, ledger: &str) -> Result<Vec<Entry>, StoreError> {
        let mut history = Vec::new();
        if let Some(current) = self.current(ledger).await? {
            history.push(current);
        }

        let archived = self.table.query_items(ledger, ARCHIVE_PREFIX).await?;
        for item in archived.into_iter().rev() {
            if history.len() >= self.history_limit {
                break;
            }
            history.push(self.decode(item)?);
        }

        history.truncate(self.history_limit);
        Ok(history)
    }

    /// Whole committed history, oldest first
    pub async fn chain(&self, ledger: &str) -> Result<Vec<Entry>, StoreError> {
        let archived = self.table.query_items(ledger, ARCHIVE_PREFIX).await?;
        let mut chain = archived
            .into_iter()
            .map(|item| self.decode(item))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(current) = self.current(ledger).await? {
            chain.push(current);
        }
        Ok(chain)
    }

    /// Unconditional single write
    pub async fn put_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        tracing::debug!(ledger = %entry.ledger, entry = %entry.entry, sequence = entry.sequence, "put entry");
        self.table.put_item(to_item(entry, &entry.ledger, entry.entry.discriminator())?).await
    }

    pub async fn delete_pending(&self, ledger: &str) -> Result<(), StoreError> {
        tracing::debug!(ledger = %ledger, "delete pending entry");
        self.table.delete_item(&ItemKey::new(ledger, PENDING)).await
    }

    /// Start a buffered, all-or-nothing write
    pub fn transaction(&self) -> LedgerTransaction {
        LedgerTransaction {
            table: Arc::clone(&self.table),
            ops: Vec::new(),
        }
    }

    fn decode(&self, mut item: Value) -> Result<Entry, StoreError> {
        if self.short {
            if let Some(fields) = item.as_object_mut() {
                for field in HEAVY_FIELDS {
                    fields.remove(field);
                }
            }
        }
        from_item(item)
    }
}

/// Writes buffered until `execute`
pub struct LedgerTransaction {
    table: Arc<dyn Table>,
    ops: Vec<WriteOp>,
}

impl LedgerTransaction {
    /// Store an entry under its state discriminator
    pub fn put_entry(&mut self, entry: &Entry, condition: Option<Condition>) -> Result<(), StoreError> {
        let item = to_item(entry, &entry.ledger, entry.entry.discriminator())?;
        self.ops.push(WriteOp::Put { item, condition });
        Ok(())
    }

    pub fn delete_entry(&mut self, ledger: &str, discriminator: &str, condition: Option<Condition>) {
        self.ops.push(WriteOp::Delete {
            key: ItemKey::new(ledger, discriminator),
            condition,
        });
    }

    pub fn put_keys(&mut self, keys: &KeyRecord) -> Result<(), StoreError> {
        let item = to_item(keys, &keys.ledger, KEYS)?;
        self.ops.push(WriteOp::Put {
            item,
            condition: Some(Condition::NotExists),
        });
        Ok(())
    }

    pub fn put_parameters(&mut self, parameters: &SystemParameters) -> Result<(), StoreError> {
        let item = to_item(parameters, SYSTEM, PARAMETERS)?;
        self.ops.push(WriteOp::Put { item, condition: None });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub async fn execute(self) -> Result<(), StoreError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        tracing::debug!(writes = self.ops.len(), "execute ledger transaction");
        self.table.transact_write(self.ops).await
    }
}

fn to_item<T: Serialize>(record: &T, ledger: &str, discriminator: &str) -> Result<Value, StoreError> {
    let mut item = serde_json::to_value(record)?;
    let fields = item
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidItem("record is not an object".to_string()))?;
    fields.insert(LEDGER_FIELD.to_string(), Value::from(ledger));
    fields.insert(ENTRY_FIELD.to_string(), Value::from(discriminator));
    Ok(item)
}

fn from_item<T: DeserializeOwned>(item: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(item)?)
}
