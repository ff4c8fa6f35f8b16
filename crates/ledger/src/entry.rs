//! Ledger entries
//!
//! A ledger has no record of its own: its state is the chain of entries
//! sharing its id. Each entry is stored under `(ledger, discriminator)`
//! where the discriminator is its state tag.

use crate::date;
use crate::error::LedgerError;
use crate::hash::INITIAL_TOKEN;
use crate::payload::{pad, Path};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use sumsy_core::Mani;

/// Id of the system ledger (issuer and sink of jubilee transfers)
pub const SYSTEM: &str = "system";

/// Discriminator of the single pending entry
pub const PENDING: &str = "pending";

/// Discriminator of the single current entry
pub const CURRENT: &str = "current";

/// Discriminator of key records
pub const KEYS: &str = "pk";

/// Discriminator of the system parameters record
pub const PARAMETERS: &str = "parameters";

/// Every archive key starts with this prefix
pub const ARCHIVE_PREFIX: &str = "/";

const SHADOW: &str = "shadow";

/// Lifecycle state of an entry, doubling as its storage discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntryState {
    /// Virtual predecessor of the first entry, never persisted
    Shadow,
    /// Waiting for signatures
    Pending,
    /// Latest fully signed entry
    Current,
    /// Superseded entry, stored under an immutable sortable key
    Archived(String),
}

impl EntryState {
    pub fn discriminator(&self) -> &str {
        match self {
            EntryState::Shadow => SHADOW,
            EntryState::Pending => PENDING,
            EntryState::Current => CURRENT,
            EntryState::Archived(key) => key,
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

impl From<EntryState> for String {
    fn from(state: EntryState) -> Self {
        state.discriminator().to_string()
    }
}

impl TryFrom<String> for EntryState {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            SHADOW => Ok(EntryState::Shadow),
            PENDING => Ok(EntryState::Pending),
            CURRENT => Ok(EntryState::Current),
            key if key.starts_with(ARCHIVE_PREFIX) => Ok(EntryState::Archived(value)),
            _ => Err(LedgerError::InvalidState(value)),
        }
    }
}

/// One record in a ledger's hash-chained history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub ledger: String,

    /// State tag, stored as the item discriminator
    pub entry: EntryState,

    /// -1 for the shadow entry, then 0, 1, 2, ...
    pub sequence: i64,

    /// Chain token of the predecessor (its `next`)
    #[serde(default)]
    pub uid: String,

    #[serde(with = "crate::date")]
    pub date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    #[serde(default)]
    pub amount: Mani,

    /// Running balance after this entry
    pub balance: Mani,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demurrage: Option<Mani>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<Mani>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_signature: Option<String>,

    /// Chain token for the following entry (hash of `signature`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl Entry {
    /// The entry that sits right before the first entry of a ledger
    pub fn shadow(ledger: impl Into<String>) -> Self {
        Self {
            ledger: ledger.into(),
            entry: EntryState::Shadow,
            sequence: -1,
            uid: String::new(),
            date: DateTime::<Utc>::UNIX_EPOCH,
            destination: None,
            amount: Mani::ZERO,
            balance: Mani::ZERO,
            demurrage: None,
            income: None,
            challenge: None,
            signature: None,
            counter_signature: None,
            next: Some(INITIAL_TOKEN.to_string()),
        }
    }

    /// A fresh pending entry following `previous`, with a working balance
    pub fn pending_after(previous: &Entry, date: DateTime<Utc>, destination: &str) -> Option<Self> {
        Some(Self {
            ledger: previous.ledger.clone(),
            entry: EntryState::Pending,
            sequence: previous.sequence + 1,
            uid: previous.next.clone()?,
            date,
            destination: Some(destination.to_string()),
            amount: Mani::ZERO,
            balance: previous.balance,
            demurrage: None,
            income: None,
            challenge: None,
            signature: None,
            counter_signature: None,
            next: None,
        })
    }

    pub fn is_system(&self) -> bool {
        self.ledger == SYSTEM
    }

    /// System entries only need the system's own signature
    pub fn is_signed(&self) -> bool {
        match (&self.signature, &self.counter_signature) {
            (Some(_), _) if self.is_system() => true,
            (Some(_), Some(_)) => true,
            _ => false,
        }
    }

    /// Position of this entry in its ledger's chain
    pub fn path(&self) -> Path {
        Path::new(&self.ledger, self.sequence, &self.uid)
    }

    /// Immutable, lexicographically sortable archive key
    pub fn sort_key(&self) -> String {
        sort_key(self.sequence, &self.date, &self.uid)
    }
}

/// `/<padded sequence>/<iso-date>/<uid>`; orders by sequence whatever the dates
pub fn sort_key(sequence: i64, date: &DateTime<Utc>, uid: &str) -> String {
    format!("/{}/{}/{}", pad(sequence), date::format(date), uid)
}
