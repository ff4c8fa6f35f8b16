//! Abstract transactional item table
//!
//! Items are JSON objects addressed by their `ledger` and `entry` fields.
//! Queries return items of one ledger ordered by `entry`.

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Partition field of every item
pub const LEDGER_FIELD: &str = "ledger";

/// Sort field of every item
pub const ENTRY_FIELD: &str = "entry";

/// Primary key of an item: `(ledger, entry)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub ledger: String,
    pub entry: String,
}

impl ItemKey {
    pub fn new(ledger: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            ledger: ledger.into(),
            entry: entry.into(),
        }
    }

    /// Key of a stored item
    pub fn of(item: &Value) -> Result<Self, StoreError> {
        let field = |name: &str| {
            item.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StoreError::InvalidItem(format!("missing string field '{}'", name)))
        };
        Ok(Self {
            ledger: field(LEDGER_FIELD)?,
            entry: field(ENTRY_FIELD)?,
        })
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ledger, self.entry)
    }
}

/// Optimistic precondition on the item a write touches
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No item with that key may exist
    NotExists,
    /// The item must exist and `field` must equal `value`
    FieldEquals { field: String, value: Value },
}

impl Condition {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Check against the item currently stored under the key
    pub fn holds(&self, existing: Option<&Value>) -> bool {
        match (self, existing) {
            (Condition::NotExists, existing) => existing.is_none(),
            (Condition::FieldEquals { field, value }, Some(item)) => item.get(field) == Some(value),
            (Condition::FieldEquals { .. }, None) => false,
        }
    }
}

/// One buffered write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        item: Value,
        condition: Option<Condition>,
    },
    Delete {
        key: ItemKey,
        condition: Option<Condition>,
    },
}

impl WriteOp {
    pub fn key(&self) -> Result<ItemKey, StoreError> {
        match self {
            WriteOp::Put { item, .. } => ItemKey::of(item),
            WriteOp::Delete { key, .. } => Ok(key.clone()),
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            WriteOp::Put { condition, .. } | WriteOp::Delete { condition, .. } => condition.as_ref(),
        }
    }
}

/// Transactional key-value store holding every ledger record
#[async_trait]
pub trait Table: Send + Sync {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Value>, StoreError>;

    /// Items of `ledger` whose `entry` starts with `prefix`, ascending
    async fn query_items(&self, ledger: &str, prefix: &str) -> Result<Vec<Value>, StoreError>;

    async fn put_item(&self, item: Value) -> Result<(), StoreError>;

    async fn delete_item(&self, key: &ItemKey) -> Result<(), StoreError>;

    /// Apply all writes or none.
    ///
    /// Every condition is checked against the state before the
    /// transaction; a failed one rejects the whole batch with
    /// `StoreError::ConditionFailed`.
    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}
