//! Ledger errors

use sumsy_core::ManiError;
use thiserror::Error;

/// Errors that can occur in ledger model operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid entry state: {0}")]
    InvalidState(String),

    #[error("Invalid system parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature from {signer}: {reason}")]
    InvalidSignature { signer: String, reason: String },

    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    #[error("Invalid amount: {0}")]
    Mani(#[from] ManiError),
}

impl LedgerError {
    /// True for malformed input (payloads, dates, amounts) as opposed to
    /// key or signature problems.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidPayload(_)
                | LedgerError::InvalidDate(_)
                | LedgerError::InvalidState(_)
                | LedgerError::InvalidParameters(_)
                | LedgerError::Mani(_)
        )
    }
}
