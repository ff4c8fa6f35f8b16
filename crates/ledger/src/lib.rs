//! SuMsy Ledger - entries, payloads, keys and the hash chain
//!
//! # Key Types
//! - `Entry`: one record in a ledger's chain (shadow, pending, current, archived)
//! - `Payload`: the canonical text both parties sign for a transfer
//! - `KeyPair` / `Verifier`: Ed25519 keys, whose fingerprint is the ledger id
//! - `Roles`: a value per transfer leg

pub mod date;
pub mod entry;
pub mod error;
pub mod hash;
pub mod payload;
pub mod records;
pub mod roles;
pub mod signature;

pub use entry::{Entry, EntryState, ARCHIVE_PREFIX, CURRENT, KEYS, PARAMETERS, PENDING, SYSTEM};
pub use error::LedgerError;
pub use hash::{chain_token, verify_chain, ChainError, INITIAL_TOKEN};
pub use payload::{destructure, flip, pad, payload, Path, Payload};
pub use records::{KeyRecord, SystemParameters};
pub use roles::{Role, Roles};
pub use signature::{fingerprint, KeyPair, Signer, Verifier};
