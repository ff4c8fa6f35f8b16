//! Engine configuration
//!
//! Loaded once when the `Sumsy` facade is built and shared read-only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sumsy_core::Mani;
use sumsy_ledger::{LedgerError, SystemParameters};
use sumsy_store::DEFAULT_HISTORY_LIMIT;

/// Configuration for the SuMsy engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Basic income written by `init`
    #[serde(default = "default_income")]
    pub default_income: Mani,

    /// Demurrage percentage written by `init`
    #[serde(default = "default_demurrage", with = "rust_decimal::serde::str")]
    pub default_demurrage: Decimal,

    /// Page size of `recent_history`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Lowest balance the system ledger may reach; unbounded when absent
    #[serde(default)]
    pub system_floor: Option<Mani>,

    /// How far a signed payload's date may run ahead of the engine clock
    #[serde(default = "default_clock_skew_seconds")]
    pub clock_skew_seconds: u32,
}

fn default_income() -> Mani {
    Mani::from(100)
}

fn default_demurrage() -> Decimal {
    Decimal::new(50, 1)
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_clock_skew_seconds() -> u32 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_income: default_income(),
            default_demurrage: default_demurrage(),
            history_limit: default_history_limit(),
            system_floor: None,
            clock_skew_seconds: default_clock_skew_seconds(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Parameters stored by `init`
    pub fn default_parameters(&self) -> Result<SystemParameters, LedgerError> {
        SystemParameters::new(self.default_income, self.default_demurrage)
    }
}
