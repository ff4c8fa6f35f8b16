//! Store errors

use thiserror::Error;

/// Errors from the item store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A buffered write's precondition did not hold; nothing was written
    #[error("Transaction rejected: condition failed on {0}")]
    ConditionFailed(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StoreError::ConditionFailed(_))
    }
}
