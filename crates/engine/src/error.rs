//! Transaction errors

use strum_macros::{Display, EnumString};
use sumsy_core::ManiError;
use sumsy_ledger::LedgerError;
use sumsy_store::StoreError;
use thiserror::Error;

/// Errors from the transaction pipeline and services
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mani(#[from] ManiError),

    #[error("Chain conflict on {ledger}: {reason}")]
    ChainConflict { ledger: String, reason: String },

    #[error("Ledger {0} already has a pending entry")]
    PendingExists(String),

    #[error("Amount {amount} not available on {ledger}")]
    InsufficientBalance { ledger: String, amount: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("System is not initialized")]
    NotInitialized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Directory error: {0}")]
    Directory(String),
}

/// Caller-facing classification of every error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    ChainConflict,
    InsufficientBalance,
    SignatureInvalid,
    NotFound,
    Forbidden,
    Storage,
}

impl TransactionError {
    pub fn conflict(ledger: impl Into<String>, reason: impl Into<String>) -> Self {
        TransactionError::ChainConflict {
            ledger: ledger.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::Ledger(e) if e.is_parse_error() => ErrorKind::Parse,
            TransactionError::Ledger(LedgerError::InvalidKey(_)) => ErrorKind::Parse,
            TransactionError::Ledger(_) => ErrorKind::SignatureInvalid,
            TransactionError::Store(e) if e.is_condition_failed() => ErrorKind::ChainConflict,
            TransactionError::Store(_) => ErrorKind::Storage,
            TransactionError::Mani(_) => ErrorKind::Parse,
            TransactionError::ChainConflict { .. } | TransactionError::PendingExists(_) => {
                ErrorKind::ChainConflict
            }
            TransactionError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            TransactionError::NotFound(_) | TransactionError::NotInitialized => ErrorKind::NotFound,
            TransactionError::Forbidden(_) => ErrorKind::Forbidden,
            TransactionError::Directory(_) => ErrorKind::Storage,
        }
    }
}

/// Result type for engine operations
pub type TransactionResult<T> = Result<T, TransactionError>;
