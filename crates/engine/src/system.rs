//! System operations: initialization, registration and the jubilee

use crate::config::EngineConfig;
use crate::directory::AccountDirectory;
use crate::error::{TransactionError, TransactionResult};
use crate::machine::StateMachine;
use crate::proof::{Registration, Signatures, FINGERPRINT_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sumsy_core::Mani;
use sumsy_ledger::{KeyPair, KeyRecord, Roles, Signer, SystemParameters, Verifier, SYSTEM};
use sumsy_store::Ledgers;

/// Totals of a jubilee run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JubileeSummary {
    /// Ledgers the jubilee was committed on
    pub ledgers: usize,
    pub demurrage: Mani,
    pub income: Mani,
}

/// Process-wide operations on the system ledger
#[derive(Clone)]
pub struct System {
    ledgers: Ledgers,
    config: Arc<EngineConfig>,
    directory: Arc<dyn AccountDirectory>,
}

impl System {
    pub fn new(ledgers: Ledgers, config: Arc<EngineConfig>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            ledgers,
            config,
            directory,
        }
    }

    fn machine(&self) -> StateMachine {
        StateMachine::new(self.ledgers.clone(), Arc::clone(&self.config))
    }

    fn system_roles(ledger: &str) -> Roles<String> {
        Roles::new(ledger.to_string(), SYSTEM.to_string())
    }

    /// The system's signing key
    async fn keys(&self) -> TransactionResult<KeyPair> {
        let record = self
            .ledgers
            .keys(SYSTEM)
            .await?
            .ok_or(TransactionError::NotInitialized)?;
        let seed = record
            .private_key
            .ok_or_else(|| TransactionError::NotFound("system private key".to_string()))?;
        Ok(KeyPair::from_hex(&seed)?)
    }

    pub async fn parameters(&self) -> TransactionResult<Option<SystemParameters>> {
        Ok(self.ledgers.parameters().await?)
    }

    /// Public part of a ledger's key registration
    pub async fn find_key(&self, ledger: &str) -> TransactionResult<Option<KeyRecord>> {
        let record = self.ledgers.keys(ledger).await?;
        Ok(record.map(|record| record.without_private_key()))
    }

    /// Create the system keys, parameters and genesis entry.
    ///
    /// Returns the stored parameters, or `None` when the system was
    /// already initialized.
    pub async fn init(&self) -> TransactionResult<Option<SystemParameters>> {
        if self.ledgers.keys(SYSTEM).await?.is_some() {
            tracing::info!("System already initialized");
            return Ok(None);
        }

        let parameters = self.config.default_parameters()?;
        let keys = KeyPair::generate();
        let mut record = KeyRecord::new(SYSTEM, keys.public_key_hex());
        record.private_key = Some(keys.seed_hex());

        let mut transaction = self.ledgers.transaction();
        transaction.put_keys(&record)?;
        transaction.put_parameters(&parameters)?;

        self.machine()
            .source(Self::system_roles(SYSTEM))
            .await?
            .target()
            .await?
            .add_amount(Mani::ZERO)?
            .add_system_signatures(&keys)?
            .commit(&mut transaction)?;
        transaction.execute().await?;

        tracing::info!(
            income = %parameters.income,
            demurrage = %parameters.demurrage,
            "System initialized"
        );
        Ok(Some(parameters))
    }

    /// Registration payload template for a new ledger; the client replaces
    /// `<fingerprint>` with its own
    pub async fn challenge(&self) -> TransactionResult<String> {
        let signing = self
            .machine()
            .source(Self::system_roles(FINGERPRINT_PLACEHOLDER))
            .await?
            .target()
            .await?
            .add_amount(Mani::ZERO)?;

        signing
            .primary()
            .challenge
            .clone()
            .ok_or_else(|| TransactionError::conflict(SYSTEM, "no challenge produced"))
    }

    /// Open a ledger for a public key; returns the ledger id
    pub async fn register(&self, registration: &Registration) -> TransactionResult<String> {
        let ledger = Verifier::from_hex(&registration.public_key)?.fingerprint();
        if self.ledgers.current(&ledger).await?.is_some() {
            tracing::info!(ledger = %ledger, "Ledger was already registered");
            return Ok(ledger);
        }

        let proposal = self.machine().proposal(&registration.payload)?;
        if proposal.payload().from.ledger != ledger {
            return Err(TransactionError::Forbidden(format!(
                "registration payload is not from {}",
                ledger
            )));
        }

        let keys = self.keys().await?;
        let mut transaction = self.ledgers.transaction();
        proposal
            .source()
            .await?
            .continue_payload(Some(Mani::ZERO))
            .await?
            .add_system_signatures(&keys)?
            .add_signatures(Signatures::from_registration(&ledger, registration))
            .await?
            .commit(&mut transaction)?;

        let mut record = KeyRecord::new(&ledger, &registration.public_key);
        record.alias = registration.alias.clone();
        record.challenge = Some(registration.payload.clone());
        transaction.put_keys(&record)?;
        transaction.execute().await?;

        tracing::info!(ledger = %ledger, alias = ?registration.alias, "Registered ledger");
        Ok(ledger)
    }

    /// Apply demurrage and income to one ledger, or to every eligible
    /// ledger in the directory
    pub async fn jubilee(&self, ledger: Option<&str>) -> TransactionResult<JubileeSummary> {
        let parameters = self
            .ledgers
            .parameters()
            .await?
            .ok_or(TransactionError::NotInitialized)?;
        let keys = self.keys().await?;

        let ledgers = match ledger {
            Some(ledger) => vec![ledger.to_string()],
            None => self
                .directory
                .list_batch_eligible_accounts()
                .await?
                .into_iter()
                .map(|account| account.ledger)
                .collect(),
        };

        let mut summary = JubileeSummary::default();
        for ledger in ledgers {
            match self.apply_jubilee(&ledger, &parameters, &keys).await {
                Ok(Some((demurrage, income))) => {
                    summary.ledgers += 1;
                    summary.demurrage = summary.demurrage.add(&demurrage)?;
                    summary.income = summary.income.add(&income)?;
                    tracing::debug!(ledger = %ledger, "Jubilee applied");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(ledger = %ledger, error = %e, "Jubilee failed");
                }
            }
        }

        tracing::info!(
            ledgers = summary.ledgers,
            demurrage = %summary.demurrage,
            income = %summary.income,
            "Jubilee completed"
        );
        Ok(summary)
    }

    /// One atomic jubilee commit; `None` when the ledger is skipped
    async fn apply_jubilee(
        &self,
        ledger: &str,
        parameters: &SystemParameters,
        keys: &dyn Signer,
    ) -> TransactionResult<Option<(Mani, Mani)>> {
        if ledger == SYSTEM {
            return Ok(None);
        }
        if self.ledgers.current(ledger).await?.is_none() {
            tracing::warn!(ledger = %ledger, "Skipping unregistered ledger");
            return Ok(None);
        }

        let mut transaction = self.ledgers.transaction();
        let committed = self
            .machine()
            .source(Self::system_roles(ledger))
            .await?
            .target()
            .await?
            .add_demurrage_income(parameters)?
            .add_system_signatures(keys)?
            .commit(&mut transaction)?;
        let primary = committed.primary();
        let totals = (
            primary.demurrage.unwrap_or_default(),
            primary.income.unwrap_or_default(),
        );
        transaction.execute().await?;
        Ok(Some(totals))
    }
}
