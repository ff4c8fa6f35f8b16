//! Transfers on a single ledger

use crate::config::EngineConfig;
use crate::error::{TransactionError, TransactionResult};
use crate::machine::StateMachine;
use crate::proof::{Proof, Signatures};
use std::sync::Arc;
use sumsy_core::Mani;
use sumsy_ledger::{flip, Entry, Roles, PENDING, SYSTEM};
use sumsy_store::{Condition, Ledgers};

/// Result of `cancel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Both pending entries were removed
    Cancelled,
    /// No pending entry matched; it may have been confirmed or cancelled
    NothingToCancel,
}

/// Operations on one ledger, identified by its fingerprint
#[derive(Clone)]
pub struct Transactions {
    ledgers: Ledgers,
    config: Arc<EngineConfig>,
    fingerprint: String,
}

impl Transactions {
    pub fn new(ledgers: Ledgers, config: Arc<EngineConfig>, fingerprint: impl Into<String>) -> Self {
        Self {
            ledgers,
            config,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Same ledger, reading without signatures
    pub fn short(&self) -> Self {
        Self {
            ledgers: self.ledgers.short(),
            ..self.clone()
        }
    }

    pub async fn current(&self) -> TransactionResult<Option<Entry>> {
        Ok(self.ledgers.current(&self.fingerprint).await?)
    }

    pub async fn pending(&self) -> TransactionResult<Option<Entry>> {
        Ok(self.ledgers.pending(&self.fingerprint).await?)
    }

    pub async fn recent_history(&self) -> TransactionResult<Vec<Entry>> {
        Ok(self.ledgers.recent_history(&self.fingerprint).await?)
    }

    fn machine(&self) -> StateMachine {
        StateMachine::new(self.ledgers.clone(), Arc::clone(&self.config))
    }

    fn check_destination(&self, destination: &str) -> TransactionResult<()> {
        if destination == SYSTEM {
            return Err(TransactionError::Forbidden(
                "transfers to the system ledger are not allowed".to_string(),
            ));
        }
        if destination == self.fingerprint {
            return Err(TransactionError::Forbidden(
                "transfers to the same ledger are not allowed".to_string(),
            ));
        }
        Ok(())
    }

    /// Payload for paying `amount` to `destination`, for the caller to sign.
    /// Nothing is stored.
    pub async fn challenge(&self, destination: &str, amount: Mani) -> TransactionResult<String> {
        self.check_destination(destination)?;
        if !amount.is_positive() {
            return Err(TransactionError::Forbidden(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        for ledger in [self.fingerprint.as_str(), destination] {
            if self.ledgers.current(ledger).await?.is_none() {
                return Err(TransactionError::NotFound(format!("ledger {}", ledger)));
            }
        }

        let signing = self
            .machine()
            .source(Roles::new(self.fingerprint.clone(), destination.to_string()))
            .await?
            .target()
            .await?
            .add_amount(-amount)?;

        let challenge = signing
            .primary()
            .challenge
            .clone()
            .ok_or_else(|| TransactionError::conflict(&self.fingerprint, "no challenge produced"))?;
        Ok(challenge)
    }

    /// Store a signed transfer as pending on both ledgers.
    /// Returns the chain token of the caller's new entry.
    pub async fn create(&self, proof: &Proof) -> TransactionResult<String> {
        if let Some(existing) = self.pending().await? {
            if existing.challenge.as_deref() == Some(proof.payload.as_str()) {
                if let Some(next) = existing.next {
                    tracing::info!(ledger = %self.fingerprint, "transaction was already created");
                    return Ok(next);
                }
            }
        }

        let proposal = self.machine().proposal(&proof.payload)?;
        if proposal.payload().from.ledger != self.fingerprint {
            return Err(TransactionError::Forbidden(format!(
                "payload is not from ledger {}",
                self.fingerprint
            )));
        }
        self.check_destination(&proposal.payload().to.ledger)?;

        let mut transaction = self.ledgers.transaction();
        let committed = proposal
            .source_registered()
            .await?
            .continue_payload(None)
            .await?
            .add_signatures(Signatures::from_proof(&self.fingerprint, proof))
            .await?
            .commit(&mut transaction)?;
        let next = committed
            .next()
            .map(str::to_string)
            .ok_or_else(|| TransactionError::conflict(&self.fingerprint, "entry was not signed"))?;
        transaction.execute().await?;

        tracing::info!(
            ledger = %self.fingerprint,
            destination = %committed.counterpart().ledger,
            sequence = committed.primary().sequence,
            "transaction created"
        );
        Ok(next)
    }

    /// Sign the counterpart side of a pending transfer, committing it when
    /// both entries are fully signed
    pub async fn confirm(&self, proof: &Proof) -> TransactionResult<String> {
        if let Some(existing) = self.current().await? {
            if existing.challenge.as_deref() == Some(proof.payload.as_str()) {
                if let Some(next) = existing.next {
                    tracing::info!(ledger = %self.fingerprint, "transaction was already confirmed");
                    return Ok(next);
                }
            }
        }

        let proposal = self.machine().proposal(&proof.payload)?;
        if proposal.payload().from.ledger != self.fingerprint {
            return Err(TransactionError::Forbidden(format!(
                "payload is not from ledger {}",
                self.fingerprint
            )));
        }

        let mut transaction = self.ledgers.transaction();
        let committed = proposal
            .continue_pending()
            .await?
            .add_signatures(Signatures::from_proof(&self.fingerprint, proof))
            .await?
            .commit(&mut transaction)?;
        let next = committed
            .next()
            .map(str::to_string)
            .ok_or_else(|| TransactionError::conflict(&self.fingerprint, "entry was not signed"))?;
        transaction.execute().await?;

        tracing::info!(
            ledger = %self.fingerprint,
            destination = %committed.counterpart().ledger,
            sequence = committed.primary().sequence,
            "transaction confirmed"
        );
        Ok(next)
    }

    /// Drop a pending transfer from both ledgers
    pub async fn cancel(&self, challenge: &str) -> TransactionResult<CancelOutcome> {
        let pending = match self.pending().await? {
            Some(pending) if pending.challenge.as_deref() == Some(challenge) => pending,
            _ => return Ok(CancelOutcome::NothingToCancel),
        };

        let destination = pending.destination.clone().unwrap_or_default();
        if destination == SYSTEM {
            return Err(TransactionError::Forbidden(
                "system transactions cannot be cancelled".to_string(),
            ));
        }

        let counterpart_challenge = flip(challenge)?;
        match self.ledgers.pending(&destination).await? {
            Some(counterpart) if counterpart.challenge.as_deref() == Some(counterpart_challenge.as_str()) => {
                let mut transaction = self.ledgers.transaction();
                transaction.delete_entry(
                    &self.fingerprint,
                    PENDING,
                    Some(Condition::field_equals("uid", pending.uid.clone())),
                );
                transaction.delete_entry(
                    &destination,
                    PENDING,
                    Some(Condition::field_equals("uid", counterpart.uid.clone())),
                );
                transaction.execute().await?;

                tracing::info!(ledger = %self.fingerprint, destination = %destination, "transaction cancelled");
                Ok(CancelOutcome::Cancelled)
            }
            _ => {
                tracing::warn!(
                    ledger = %self.fingerprint,
                    destination = %destination,
                    "no matching pending entry on destination"
                );
                Err(TransactionError::NotFound(format!(
                    "matching pending entry on destination ledger {}",
                    destination
                )))
            }
        }
    }
}
