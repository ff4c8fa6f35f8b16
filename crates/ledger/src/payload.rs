//! Canonical transfer payloads ("challenges").
//!
//! Grammar:
//!
//! ```text
//! /<iso-date>/from/<ledger>/<sequence>/<uid>/to/<ledger>/<sequence>/<uid>[/<amount>]
//! ```
//!
//! The signed payload is the transaction: there is no separate id.
//! Sequences are zero-padded to 12 digits, amounts use the canonical
//! `Mani` format. Parsing only accepts the canonical spelling, so
//! `payload(destructure(p)) == p` for every accepted `p`.

use crate::date;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use sumsy_core::Mani;

/// Width of the zero-padded sequence in paths and archive keys
pub const SEQUENCE_WIDTH: usize = 12;

/// Zero-pad a sequence number
pub fn pad(sequence: i64) -> String {
    format!("{:0>width$}", sequence, width = SEQUENCE_WIDTH)
}

/// Position of an entry in a ledger's chain: `/<ledger>/<sequence>/<uid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    pub ledger: String,
    pub sequence: i64,
    pub uid: String,
}

impl Path {
    pub fn new(ledger: impl Into<String>, sequence: i64, uid: impl Into<String>) -> Self {
        Self {
            ledger: ledger.into(),
            sequence,
            uid: uid.into(),
        }
    }

    fn parse(segments: &[&str]) -> Result<Self, LedgerError> {
        let [ledger, sequence, uid] = segments else {
            return Err(LedgerError::InvalidPayload("invalid path".to_string()));
        };
        if !is_identifier(ledger) {
            return Err(LedgerError::InvalidPayload(format!("invalid ledger id '{}'", ledger)));
        }
        if sequence.len() != SEQUENCE_WIDTH || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidPayload(format!("invalid sequence '{}'", sequence)));
        }
        if !is_identifier(uid) {
            return Err(LedgerError::InvalidPayload(format!("invalid uid '{}'", uid)));
        }
        let sequence = sequence
            .parse()
            .map_err(|_| LedgerError::InvalidPayload(format!("invalid sequence '{}'", sequence)))?;

        Ok(Self::new(*ledger, sequence, *uid))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.ledger, pad(self.sequence), self.uid)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Structured form of a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub date: DateTime<Utc>,
    pub from: Path,
    pub to: Path,
    /// Absent in pre-transfer challenges, mandatory in signed proofs
    pub amount: Option<Mani>,
}

impl Payload {
    pub fn new(date: DateTime<Utc>, from: Path, to: Path, amount: Option<Mani>) -> Self {
        Self {
            date,
            from,
            to,
            amount,
        }
    }

    /// Canonical text form
    pub fn encode(&self) -> String {
        let mut text = format!("/{}/from{}/to{}", date::format(&self.date), self.from, self.to);
        if let Some(amount) = &self.amount {
            text.push('/');
            text.push_str(&amount.format());
        }
        text
    }

    /// The counterpart's view of the same transfer
    pub fn flipped(&self) -> Payload {
        Payload {
            date: self.date,
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount.map(|amount| -amount),
        }
    }

    /// The amount, which signed proofs must carry
    pub fn require_amount(&self) -> Result<Mani, LedgerError> {
        self.amount
            .ok_or_else(|| LedgerError::InvalidPayload("missing amount".to_string()))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Payload {
    type Err = LedgerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = text.split('/').collect();
        if !(segments.len() == 10 || segments.len() == 11)
            || !segments[0].is_empty()
            || segments[2] != "from"
            || segments[6] != "to"
        {
            return Err(LedgerError::InvalidPayload(text.to_string()));
        }

        let payload = Payload {
            date: date::parse(segments[1])?,
            from: Path::parse(&segments[3..6])?,
            to: Path::parse(&segments[7..10])?,
            amount: segments.get(10).map(|amount| amount.parse()).transpose()?,
        };

        if payload.encode() != text {
            return Err(LedgerError::InvalidPayload(format!("non-canonical payload '{}'", text)));
        }
        Ok(payload)
    }
}

/// Encode a payload
pub fn payload(date: DateTime<Utc>, from: &Path, to: &Path, amount: Option<Mani>) -> String {
    Payload::new(date, from.clone(), to.clone(), amount).encode()
}

/// Parse a payload, optionally as seen from the counterpart
pub fn destructure(text: &str, flip: bool) -> Result<Payload, LedgerError> {
    let payload: Payload = text.parse()?;
    Ok(if flip { payload.flipped() } else { payload })
}

/// The counterpart's payload for the same transfer
pub fn flip(text: &str) -> Result<String, LedgerError> {
    Ok(destructure(text, true)?.encode())
}
