//! Transaction state machine
//!
//! A transfer touches two ledgers (the `Roles`), and each gets a new entry
//! (its leg). The pipeline is a chain of stage types, each offering only
//! the moves legal at that point:
//!
//! ```text
//! StateMachine ──source──▶ Sourced ──target──▶ Targeted ──add_amount / add_demurrage_income──┐
//!      │                                                                                       ▼
//!      └─proposal─▶ Proposal ──source / source_registered──▶ ProposalSourced ──continue_payload─▶ Signing ──commit──▶ Committed
//!                       └──────────────────────continue_pending───────────────────────────────▶   (add_*signatures)
//! ```
//!
//! Nothing is written until `Signing::commit` buffers the legs into a
//! `LedgerTransaction`; the caller executes it.

use crate::config::EngineConfig;
use crate::error::{TransactionError, TransactionResult};
use crate::proof::Signatures;
use chrono::Duration;
use std::sync::Arc;
use sumsy_core::Mani;
use sumsy_ledger::entry::sort_key;
use sumsy_ledger::{
    chain_token, date, Entry, EntryState, Payload, Role, Roles, Signer, SystemParameters, Verifier, PENDING,
    SYSTEM,
};
use sumsy_store::{Condition, LedgerTransaction, Ledgers};

/// How a leg's target came about, which decides how it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Allocated right after its source
    Fresh,
    /// Loaded from the ledger's pending entry
    Pending,
    /// Already committed system entry; never rewritten
    Settled,
}

#[derive(Debug, Clone)]
struct Leg {
    source: Option<Entry>,
    target: Entry,
    origin: Origin,
}

#[derive(Clone)]
struct Pipeline {
    ledgers: Ledgers,
    config: Arc<EngineConfig>,
}

impl Pipeline {
    async fn current_or_shadow(&self, ledger: &str) -> TransactionResult<Entry> {
        Ok(self
            .ledgers
            .current(ledger)
            .await?
            .unwrap_or_else(|| Entry::shadow(ledger)))
    }

    async fn registered_current(&self, ledger: &str) -> TransactionResult<Entry> {
        self.ledgers
            .current(ledger)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("ledger {}", ledger)))
    }

    /// The system ledger never has pending entries
    async fn ensure_no_pending(&self, ledger: &str) -> TransactionResult<()> {
        if ledger != SYSTEM && self.ledgers.pending(ledger).await?.is_some() {
            return Err(TransactionError::PendingExists(ledger.to_string()));
        }
        Ok(())
    }

    fn check_balance(&self, entry: &Entry) -> TransactionResult<()> {
        let overdrawn = if entry.is_system() {
            matches!(self.config.system_floor, Some(floor) if entry.balance < floor)
        } else {
            entry.balance.is_negative()
        };
        if overdrawn {
            return Err(TransactionError::InsufficientBalance {
                ledger: entry.ledger.clone(),
                amount: (-entry.amount).format(),
            });
        }
        Ok(())
    }

    /// A system entry that was committed when the payload was issued
    async fn settled_system_entry(&self, payload: &Payload) -> TransactionResult<Entry> {
        let key = sort_key(payload.from.sequence, &payload.date, &payload.from.uid);
        let candidate = match self.ledgers.entry(SYSTEM, &key).await? {
            Some(archived) => Some(archived),
            None => self.ledgers.current(SYSTEM).await?,
        };

        match candidate {
            Some(entry)
                if entry.sequence == payload.from.sequence
                    && entry.uid == payload.from.uid
                    && entry.date == payload.date
                    && Some(entry.amount) == payload.amount =>
            {
                Ok(entry)
            }
            _ => Err(TransactionError::NotFound(format!(
                "matching system entry {}",
                payload.from
            ))),
        }
    }
}

fn challenge_of(entry: &Entry) -> TransactionResult<&str> {
    entry
        .challenge
        .as_deref()
        .ok_or_else(|| TransactionError::conflict(&entry.ledger, "entry has no challenge"))
}

/// Entry point of every pipeline
pub struct StateMachine {
    pipeline: Pipeline,
}

impl StateMachine {
    pub fn new(ledgers: Ledgers, config: Arc<EngineConfig>) -> Self {
        Self {
            pipeline: Pipeline { ledgers, config },
        }
    }

    /// Load each role's current entry, or its shadow for a new ledger
    pub async fn source(self, ids: Roles<String>) -> TransactionResult<Sourced> {
        tracing::debug!(ledger = %ids.ledger, destination = %ids.destination, "sourcing");
        let sources = Roles::new(
            self.pipeline.current_or_shadow(&ids.ledger).await?,
            self.pipeline.current_or_shadow(&ids.destination).await?,
        );
        Ok(Sourced {
            pipeline: self.pipeline,
            sources,
        })
    }

    /// Start from a payload received from a client
    pub fn proposal(self, payload: &str) -> TransactionResult<Proposal> {
        let ledger: Payload = payload.parse()?;
        let destination = ledger.flipped();
        let challenges = Roles::new(payload.to_string(), destination.encode());
        Ok(Proposal {
            pipeline: self.pipeline,
            payloads: Roles::new(ledger, destination),
            challenges,
        })
    }
}

/// Sources loaded, no targets yet
pub struct Sourced {
    pipeline: Pipeline,
    sources: Roles<Entry>,
}

impl Sourced {
    pub fn sources(&self) -> &Roles<Entry> {
        &self.sources
    }

    /// Allocate the next entry on both ledgers
    pub async fn target(self) -> TransactionResult<Targeted> {
        self.pipeline.ensure_no_pending(&self.sources.ledger.ledger).await?;
        self.pipeline
            .ensure_no_pending(&self.sources.destination.ledger)
            .await?;

        let date = date::now();
        let counterparts = Roles::new(
            self.sources.destination.ledger.clone(),
            self.sources.ledger.ledger.clone(),
        );
        let legs = self.sources.try_map(|role, source| {
            let target = Entry::pending_after(&source, date, counterparts.get(role)).ok_or_else(|| {
                TransactionError::conflict(&source.ledger, "current entry has no next token")
            })?;
            tracing::debug!(role = %role, ledger = %target.ledger, sequence = target.sequence, "targeted");
            Ok::<_, TransactionError>(Leg {
                source: Some(source),
                target,
                origin: Origin::Fresh,
            })
        })?;

        Ok(Targeted {
            pipeline: self.pipeline,
            legs,
        })
    }
}

/// Fresh targets waiting for an amount
pub struct Targeted {
    pipeline: Pipeline,
    legs: Roles<Leg>,
}

impl Targeted {
    pub fn primary(&self) -> &Entry {
        &self.legs.ledger.target
    }

    /// Move `amount` to the primary ledger and its negation to the counterpart
    pub fn add_amount(mut self, amount: Mani) -> TransactionResult<Signing> {
        self.settle(amount)?;
        Ok(Signing {
            pipeline: self.pipeline,
            legs: self.legs,
        })
    }

    /// Charge demurrage and pay income to the primary ledger, mirrored on
    /// the counterpart
    pub fn add_demurrage_income(mut self, parameters: &SystemParameters) -> TransactionResult<Signing> {
        let demurrage = parameters.demurrage_on(&self.legs.ledger.target.balance)?;
        let income = parameters.income;
        let amount = income.subtract(&demurrage)?;

        self.legs.ledger.target.demurrage = Some(demurrage);
        self.legs.ledger.target.income = Some(income);
        self.legs.destination.target.demurrage = Some(-demurrage);
        self.legs.destination.target.income = Some(-income);

        self.settle(amount)?;
        Ok(Signing {
            pipeline: self.pipeline,
            legs: self.legs,
        })
    }

    fn settle(&mut self, amount: Mani) -> TransactionResult<()> {
        let complement = -amount;
        for (role, amount) in [(Role::Ledger, amount), (Role::Destination, complement)] {
            let target = &mut self.legs.get_mut(role).target;
            target.amount = amount;
            target.balance = target.balance.add(&amount)?;
        }

        let date = self.legs.ledger.target.date;
        let ledger_path = self.legs.ledger.target.path();
        let destination_path = self.legs.destination.target.path();
        self.legs.ledger.target.challenge = Some(sumsy_ledger::payload(
            date,
            &ledger_path,
            &destination_path,
            Some(amount),
        ));
        self.legs.destination.target.challenge = Some(sumsy_ledger::payload(
            date,
            &destination_path,
            &ledger_path,
            Some(complement),
        ));

        self.pipeline.check_balance(&self.legs.ledger.target)?;
        self.pipeline.check_balance(&self.legs.destination.target)
    }
}

/// Both views of a client payload, parsed
pub struct Proposal {
    pipeline: Pipeline,
    payloads: Roles<Payload>,
    challenges: Roles<String>,
}

impl Proposal {
    /// The submitter's view
    pub fn payload(&self) -> &Payload {
        &self.payloads.ledger
    }

    /// Source both ledgers, allowing a ledger that does not exist yet
    pub async fn source(self) -> TransactionResult<ProposalSourced> {
        let sources = Roles::new(
            self.pipeline
                .current_or_shadow(&self.payloads.ledger.from.ledger)
                .await?,
            self.pipeline
                .current_or_shadow(&self.payloads.destination.from.ledger)
                .await?,
        );
        Ok(self.sourced(sources))
    }

    /// Source both ledgers, which must be registered
    pub async fn source_registered(self) -> TransactionResult<ProposalSourced> {
        let sources = Roles::new(
            self.pipeline
                .registered_current(&self.payloads.ledger.from.ledger)
                .await?,
            self.pipeline
                .registered_current(&self.payloads.destination.from.ledger)
                .await?,
        );
        Ok(self.sourced(sources))
    }

    fn sourced(self, sources: Roles<Entry>) -> ProposalSourced {
        tracing::debug!(
            ledger = %sources.ledger.ledger,
            destination = %sources.destination.ledger,
            "sourced from payload"
        );
        ProposalSourced {
            pipeline: self.pipeline,
            payloads: self.payloads,
            challenges: self.challenges,
            sources,
        }
    }

    /// Pick up the entries an earlier `create` (or a system transfer) left
    pub async fn continue_pending(self) -> TransactionResult<Signing> {
        let ledger = self.pending_leg(&self.payloads.ledger).await?;
        let destination = self.pending_leg(&self.payloads.destination).await?;
        Ok(Signing {
            pipeline: self.pipeline,
            legs: Roles::new(ledger, destination),
        })
    }

    async fn pending_leg(&self, payload: &Payload) -> TransactionResult<Leg> {
        let ledger = &payload.from.ledger;
        if ledger == SYSTEM {
            let target = self.pipeline.settled_system_entry(payload).await?;
            return Ok(Leg {
                source: None,
                target,
                origin: Origin::Settled,
            });
        }

        let pending = self
            .pipeline
            .ledgers
            .pending(ledger)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("pending entry on {}", ledger)))?;

        let amount = payload.require_amount()?;
        if pending.date != payload.date
            || pending.destination.as_deref() != Some(payload.to.ledger.as_str())
            || pending.sequence != payload.from.sequence
            || pending.uid != payload.from.uid
            || pending.amount != amount
        {
            return Err(TransactionError::conflict(ledger, "pending entry does not match payload"));
        }

        let current = self.pipeline.registered_current(ledger).await?;
        if current.next.as_deref() != Some(pending.uid.as_str()) || pending.sequence != current.sequence + 1 {
            return Err(TransactionError::conflict(ledger, "pending entry does not follow current"));
        }

        Ok(Leg {
            source: Some(current),
            target: pending,
            origin: Origin::Pending,
        })
    }
}

/// Payload and sources loaded
pub struct ProposalSourced {
    pipeline: Pipeline,
    payloads: Roles<Payload>,
    challenges: Roles<String>,
    sources: Roles<Entry>,
}

impl ProposalSourced {
    /// Rebuild both targets from the payload, checking it against the
    /// locally expected chain position. `expected_amount` pins the primary
    /// amount (zero for registrations).
    pub async fn continue_payload(self, expected_amount: Option<Mani>) -> TransactionResult<Signing> {
        let ledger = self.payload_leg(Role::Ledger, expected_amount).await?;
        let destination = self.payload_leg(Role::Destination, None).await?;
        Ok(Signing {
            pipeline: self.pipeline,
            legs: Roles::new(ledger, destination),
        })
    }

    async fn payload_leg(&self, role: Role, expected_amount: Option<Mani>) -> TransactionResult<Leg> {
        let payload = self.payloads.get(role);
        let source = self.sources.get(role);
        let ledger = &payload.from.ledger;

        if payload.from.sequence != source.sequence + 1 {
            return Err(TransactionError::conflict(
                ledger,
                format!(
                    "sequence {} does not follow {}",
                    payload.from.sequence, source.sequence
                ),
            ));
        }
        if source.next.as_deref() != Some(payload.from.uid.as_str()) {
            return Err(TransactionError::conflict(ledger, "uid does not match the next token"));
        }

        if payload.date < source.date {
            return Err(TransactionError::conflict(
                ledger,
                format!(
                    "payload date {} precedes entry {}",
                    date::format(&payload.date),
                    source.sequence
                ),
            ));
        }
        let horizon = date::now() + Duration::seconds(i64::from(self.pipeline.config.clock_skew_seconds));
        if payload.date > horizon {
            return Err(TransactionError::conflict(
                ledger,
                format!("payload date {} lies in the future", date::format(&payload.date)),
            ));
        }

        let amount = payload.require_amount()?;
        if let Some(expected) = expected_amount {
            if amount != expected {
                return Err(TransactionError::Forbidden(format!(
                    "amount must be {}, got {}",
                    expected, amount
                )));
            }
        }

        self.pipeline.ensure_no_pending(ledger).await?;

        let mut target = Entry::pending_after(source, payload.date, &payload.to.ledger)
            .ok_or_else(|| TransactionError::conflict(ledger, "current entry has no next token"))?;
        target.amount = amount;
        target.balance = source.balance.add(&amount)?;
        target.challenge = Some(self.challenges.get(role).clone());
        self.pipeline.check_balance(&target)?;

        tracing::debug!(role = %role, ledger = %ledger, sequence = target.sequence, "reconstructed from payload");
        Ok(Leg {
            source: Some(source.clone()),
            target,
            origin: Origin::Fresh,
        })
    }
}

/// Targets complete, collecting signatures
pub struct Signing {
    pipeline: Pipeline,
    legs: Roles<Leg>,
}

impl Signing {
    /// The submitter's entry
    pub fn primary(&self) -> &Entry {
        &self.legs.ledger.target
    }

    pub fn counterpart(&self) -> &Entry {
        &self.legs.destination.target
    }

    /// System transfer to itself, only at init
    pub fn is_genesis(&self) -> bool {
        self.legs.ledger.target.ledger == self.legs.destination.target.ledger
    }

    /// Sign as the system: its own entry, and a counter-signature on the
    /// primary entry
    pub fn add_system_signatures(mut self, keys: &dyn Signer) -> TransactionResult<Signing> {
        if self.legs.destination.target.ledger != SYSTEM
            || self.legs.ledger.target.destination.as_deref() != Some(SYSTEM)
            || self.legs.destination.origin == Origin::Settled
        {
            return Err(TransactionError::Forbidden(
                "system signatures need a fresh system counterpart".to_string(),
            ));
        }

        let signature = keys.sign(challenge_of(&self.legs.destination.target)?);
        let next = chain_token(&signature);
        tracing::debug!(ledger = %self.legs.ledger.target.ledger, "system signing");

        if self.is_genesis() {
            if self.legs.ledger.target.challenge != self.legs.destination.target.challenge {
                return Err(TransactionError::conflict(SYSTEM, "genesis legs differ"));
            }
            let primary = &mut self.legs.ledger.target;
            primary.signature = Some(signature.clone());
            primary.counter_signature = Some(signature.clone());
            primary.next = Some(next.clone());
            self.legs.destination.target.counter_signature = Some(signature.clone());
        } else {
            let counter_signature = keys.sign(challenge_of(&self.legs.ledger.target)?);
            self.legs.ledger.target.counter_signature = Some(counter_signature);
        }

        let system = &mut self.legs.destination.target;
        system.signature = Some(signature);
        system.next = Some(next);
        Ok(self)
    }

    /// Verify and attach a party's signature pair
    pub async fn add_signatures(mut self, signatures: Signatures) -> TransactionResult<Signing> {
        let primary = &self.legs.ledger.target;
        if signatures.ledger != primary.ledger {
            return Err(TransactionError::Forbidden(format!(
                "{} cannot sign for {}",
                signatures.ledger, primary.ledger
            )));
        }

        let public_key = match signatures.public_key {
            Some(public_key) => public_key,
            None => {
                self.pipeline
                    .ledgers
                    .keys(&signatures.ledger)
                    .await?
                    .ok_or_else(|| TransactionError::NotFound(format!("public key of {}", signatures.ledger)))?
                    .public_key
            }
        };

        let verifier = Verifier::from_hex(&public_key)?;
        verifier.verify(challenge_of(primary)?, &signatures.signature)?;
        verifier.verify(
            challenge_of(&self.legs.destination.target)?,
            &signatures.counter_signature,
        )?;

        let next = chain_token(&signatures.signature);
        let primary = &mut self.legs.ledger.target;
        primary.signature = Some(signatures.signature);
        primary.next = Some(next);

        if self.legs.destination.origin != Origin::Settled {
            self.legs.destination.target.counter_signature = Some(signatures.counter_signature);
        }

        tracing::debug!(ledger = %signatures.ledger, "signatures attached");
        Ok(self)
    }

    /// Buffer the writes for both legs
    pub fn commit(mut self, transaction: &mut LedgerTransaction) -> TransactionResult<Committed> {
        if self.is_genesis() {
            // one entry, written once
            write_leg(transaction, &mut self.legs.destination)?;
            self.legs.ledger.target = self.legs.destination.target.clone();
        } else {
            write_leg(transaction, &mut self.legs.ledger)?;
            write_leg(transaction, &mut self.legs.destination)?;
        }
        Ok(Committed { legs: self.legs })
    }
}

fn write_leg(transaction: &mut LedgerTransaction, leg: &mut Leg) -> TransactionResult<()> {
    let target = &mut leg.target;
    if leg.origin == Origin::Settled {
        tracing::debug!(ledger = %target.ledger, sequence = target.sequence, "settled entry left as is");
        return Ok(());
    }

    if !target.is_signed() {
        target.entry = EntryState::Pending;
        let condition = match leg.origin {
            Origin::Pending => Condition::field_equals("uid", target.uid.clone()),
            _ => Condition::NotExists,
        };
        transaction.put_entry(target, Some(condition))?;
        tracing::debug!(ledger = %target.ledger, sequence = target.sequence, "saved as pending");
        return Ok(());
    }

    target.entry = EntryState::Current;
    let previous = leg.source.as_ref().filter(|source| source.entry == EntryState::Current);
    let condition = match previous {
        Some(_) => Condition::field_equals("next", target.uid.clone()),
        None => Condition::NotExists,
    };
    transaction.put_entry(target, Some(condition))?;

    if let Some(previous) = previous {
        let mut archived = previous.clone();
        archived.entry = EntryState::Archived(previous.sort_key());
        transaction.put_entry(&archived, Some(Condition::NotExists))?;
    }

    if leg.origin == Origin::Pending {
        transaction.delete_entry(
            &target.ledger,
            PENDING,
            Some(Condition::field_equals("uid", target.uid.clone())),
        );
    }

    tracing::debug!(ledger = %target.ledger, sequence = target.sequence, "made current");
    Ok(())
}

/// Writes buffered; the result of the pipeline
pub struct Committed {
    legs: Roles<Leg>,
}

impl Committed {
    pub fn primary(&self) -> &Entry {
        &self.legs.ledger.target
    }

    pub fn counterpart(&self) -> &Entry {
        &self.legs.destination.target
    }

    /// Chain token of the primary entry
    pub fn next(&self) -> Option<&str> {
        self.primary().next.as_deref()
    }
}
