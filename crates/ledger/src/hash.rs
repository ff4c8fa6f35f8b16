//! Hash chain utilities for ledger integrity
//!
//! Every entry carries the predecessor's `next` as its `uid`, and `next`
//! is the SHA-256 of the entry's own signature. Appending therefore needs
//! the signed predecessor, and a rewritten entry breaks every later link.

use crate::entry::Entry;
use sha2::{Digest, Sha256};
use sumsy_core::Mani;

/// `next` of the shadow entry, i.e. `uid` of every ledger's first entry
pub const INITIAL_TOKEN: &str = "init";

/// Chain token derived from a hex signature
pub fn chain_token(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a ledger's committed entries, oldest first
pub fn verify_chain(entries: &[Entry]) -> Result<(), ChainError> {
    let mut previous: Option<&Entry> = None;

    for entry in entries {
        let (expected_sequence, expected_uid, expected_balance) = match previous {
            Some(prev) => (
                prev.sequence + 1,
                prev.next.clone().unwrap_or_default(),
                prev.balance,
            ),
            None => (0, INITIAL_TOKEN.to_string(), Mani::ZERO),
        };

        if entry.sequence != expected_sequence {
            return Err(ChainError::InvalidSequence {
                expected: expected_sequence,
                actual: entry.sequence,
            });
        }

        if entry.uid != expected_uid {
            return Err(ChainError::BrokenLink {
                sequence: entry.sequence,
                expected: expected_uid,
                actual: entry.uid.clone(),
            });
        }

        let Some(signature) = entry.signature.as_deref() else {
            return Err(ChainError::Unsigned {
                sequence: entry.sequence,
            });
        };

        let token = chain_token(signature);
        if entry.next.as_deref() != Some(token.as_str()) {
            return Err(ChainError::InvalidToken {
                sequence: entry.sequence,
                expected: token,
                actual: entry.next.clone().unwrap_or_default(),
            });
        }

        let balance = expected_balance.add(&entry.amount).ok();
        if balance != Some(entry.balance) {
            return Err(ChainError::BalanceMismatch {
                sequence: entry.sequence,
                expected: balance.map(|b| b.format()).unwrap_or_default(),
                actual: entry.balance.format(),
            });
        }

        previous = Some(entry);
    }

    Ok(())
}

/// Errors in hash chain verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    BrokenLink {
        sequence: i64,
        expected: String,
        actual: String,
    },
    InvalidToken {
        sequence: i64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: i64,
        actual: i64,
    },
    BalanceMismatch {
        sequence: i64,
        expected: String,
        actual: String,
    },
    Unsigned {
        sequence: i64,
    },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Broken link at seq {}: expected uid '{}', got '{}'",
                    sequence, expected, actual
                )
            }
            ChainError::InvalidToken {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Invalid next token at seq {}: expected '{}', got '{}'",
                    sequence, expected, actual
                )
            }
            ChainError::InvalidSequence { expected, actual } => {
                write!(f, "Invalid sequence: expected {}, got {}", expected, actual)
            }
            ChainError::BalanceMismatch {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Balance mismatch at seq {}: expected {}, got {}",
                    sequence, expected, actual
                )
            }
            ChainError::Unsigned { sequence } => {
                write!(f, "Unsigned entry at seq {}", sequence)
            }
        }
    }
}

impl std::error::Error for ChainError {}
