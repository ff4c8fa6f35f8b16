//! Non-entry records: registered keys and system parameters

use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sumsy_core::Mani;

/// Public key registration of a ledger, stored under `(ledger, "pk")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub ledger: String,

    /// Hex-encoded Ed25519 public key
    pub public_key: String,

    /// Only the system keeps its seed here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Challenge the key was registered with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

impl KeyRecord {
    pub fn new(ledger: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            ledger: ledger.into(),
            public_key: public_key.into(),
            private_key: None,
            alias: None,
            challenge: None,
        }
    }

    /// Copy safe to hand out
    pub fn without_private_key(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }
}

/// SuMsy parameters stored under `("system", "parameters")`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// Guaranteed income per jubilee
    pub income: Mani,

    /// Demurrage percentage, 0 to 100
    #[serde(with = "rust_decimal::serde::str")]
    pub demurrage: Decimal,
}

impl SystemParameters {
    pub fn new(income: Mani, demurrage: Decimal) -> Result<Self, LedgerError> {
        let parameters = Self { income, demurrage };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.income.is_negative() {
            return Err(LedgerError::InvalidParameters(format!(
                "income must not be negative, got {}",
                self.income
            )));
        }
        if self.demurrage < Decimal::ZERO || self.demurrage > Decimal::ONE_HUNDRED {
            return Err(LedgerError::InvalidParameters(format!(
                "demurrage must be between 0 and 100, got {}",
                self.demurrage
            )));
        }
        Ok(())
    }

    /// Demurrage charged on a balance
    pub fn demurrage_on(&self, balance: &Mani) -> Result<Mani, LedgerError> {
        Ok(balance.multiply(self.demurrage / Decimal::ONE_HUNDRED)?)
    }
}
