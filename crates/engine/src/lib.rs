//! SuMsy Engine - transfers, registration and the jubilee
//!
//! # Key Types
//! - `Sumsy`: facade handing out the system and per-ledger services
//! - `System`: init, registration, parameters, jubilee
//! - `Transactions`: challenge, create, confirm, cancel on one ledger
//! - `StateMachine`: the staged pipeline both services drive

pub mod config;
pub mod directory;
pub mod error;
pub mod machine;
pub mod proof;
pub mod system;
pub mod transactions;

pub use config::EngineConfig;
pub use directory::{Account, AccountDirectory, FileDirectory, StaticDirectory};
pub use error::{ErrorKind, TransactionError, TransactionResult};
pub use machine::{Committed, Proposal, ProposalSourced, Signing, Sourced, StateMachine, Targeted};
pub use proof::{Proof, Registration, Signatures, FINGERPRINT_PLACEHOLDER};
pub use system::{JubileeSummary, System};
pub use transactions::{CancelOutcome, Transactions};

use std::sync::Arc;
use sumsy_store::{Ledgers, Table};

/// Entry point binding a store, a directory and a configuration
#[derive(Clone)]
pub struct Sumsy {
    ledgers: Ledgers,
    config: Arc<EngineConfig>,
    directory: Arc<dyn AccountDirectory>,
}

impl Sumsy {
    pub fn new(table: Arc<dyn Table>, directory: Arc<dyn AccountDirectory>, config: EngineConfig) -> Self {
        let ledgers = Ledgers::new(table).with_history_limit(config.history_limit);
        Self {
            ledgers,
            config: Arc::new(config),
            directory,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Raw ledger view, e.g. for auditing
    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn system(&self) -> System {
        System::new(self.ledgers.clone(), Arc::clone(&self.config), Arc::clone(&self.directory))
    }

    pub fn ledger(&self, fingerprint: impl Into<String>) -> Transactions {
        Transactions::new(self.ledgers.clone(), Arc::clone(&self.config), fingerprint)
    }
}
