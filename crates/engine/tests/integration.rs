//! Integration tests for SuMsy
//!
//! These drive the system and ledger services end to end: init,
//! registration, transfers, cancellation and the jubilee.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use sumsy_core::Mani;
use sumsy_engine::{
    CancelOutcome, EngineConfig, ErrorKind, Proof, Registration, Signatures, StateMachine, StaticDirectory, Sumsy,
    TransactionError,
};
use sumsy_ledger::{date, destructure, flip, verify_chain, EntryState, KeyPair, Signer, CURRENT, PENDING, SYSTEM};
use sumsy_store::{ItemKey, MemoryTable, SqliteTable, Table};
use tempfile::TempDir;

fn mani(value: i64) -> Mani {
    Mani::from(value)
}

fn sumsy_on(table: Arc<dyn Table>) -> Sumsy {
    Sumsy::new(table, Arc::new(StaticDirectory::default()), EngineConfig::default())
}

async fn initialized() -> (Arc<MemoryTable>, Sumsy) {
    let table = Arc::new(MemoryTable::new());
    let sumsy = sumsy_on(table.clone());
    sumsy.system().init().await.unwrap();
    (table, sumsy)
}

async fn register(sumsy: &Sumsy, alias: &str) -> (KeyPair, String) {
    let keys = KeyPair::generate();
    let template = sumsy.system().challenge().await.unwrap();
    let registration = Registration::sign(&keys, &template, Some(alias)).unwrap();
    let ledger = sumsy.system().register(&registration).await.unwrap();
    (keys, ledger)
}

/// Sign and confirm whatever is pending on the ledger
async fn confirm_pending(sumsy: &Sumsy, keys: &KeyPair, ledger: &str) -> String {
    let pending = sumsy.ledger(ledger).pending().await.unwrap().unwrap();
    let proof = Proof::sign(keys, pending.challenge.as_deref().unwrap()).unwrap();
    sumsy.ledger(ledger).confirm(&proof).await.unwrap()
}

/// Give a fresh ledger its first basic income (100 with default parameters)
async fn fund(sumsy: &Sumsy, keys: &KeyPair, ledger: &str) {
    let summary = sumsy.system().jubilee(Some(ledger)).await.unwrap();
    assert_eq!(summary.ledgers, 1);
    confirm_pending(sumsy, keys, ledger).await;
}

async fn transfer_payload(sumsy: &Sumsy, from: &str, to: &str, amount: i64) -> String {
    sumsy.ledger(from).challenge(to, mani(amount)).await.unwrap()
}

/// Test: uninitialized system → init → parameters and genesis entry
#[tokio::test]
async fn test_init() {
    let sumsy = sumsy_on(Arc::new(MemoryTable::new()));
    assert!(sumsy.system().parameters().await.unwrap().is_none());

    let parameters = sumsy.system().init().await.unwrap().unwrap();
    assert_eq!(parameters.income, mani(100));
    assert_eq!(parameters.demurrage, dec!(5.0));
    assert_eq!(sumsy.system().parameters().await.unwrap(), Some(parameters));

    let genesis = sumsy.ledger(SYSTEM).current().await.unwrap().unwrap();
    assert_eq!(genesis.sequence, 0);
    assert_eq!(genesis.entry, EntryState::Current);
    assert!(genesis.balance.is_zero());
    assert_eq!(genesis.signature, genesis.counter_signature);

    // Repeat is a no-op
    assert!(sumsy.system().init().await.unwrap().is_none());
    let again = sumsy.ledger(SYSTEM).current().await.unwrap().unwrap();
    assert_eq!(again, genesis);

    // The private key never leaves the store
    let key = sumsy.system().find_key(SYSTEM).await.unwrap().unwrap();
    assert_eq!(key.private_key, None);
}

#[tokio::test]
async fn test_register() {
    let (_table, sumsy) = initialized().await;

    let template = sumsy.system().challenge().await.unwrap();
    assert!(template.contains("/from/<fingerprint>/000000000000/init/to/system/000000000001/"));
    assert!(template.ends_with("/0,00 ɱ"));

    let keys = KeyPair::generate();
    let registration = Registration::sign(&keys, &template, Some("alice")).unwrap();
    let ledger = sumsy.system().register(&registration).await.unwrap();
    assert_eq!(ledger, keys.fingerprint());

    let current = sumsy.ledger(&ledger).current().await.unwrap().unwrap();
    assert_eq!(current.sequence, 0);
    assert!(current.balance.is_zero());
    assert!(current.signature.is_some() && current.counter_signature.is_some());

    let key = sumsy.system().find_key(&ledger).await.unwrap().unwrap();
    assert_eq!(key.alias.as_deref(), Some("alice"));
    assert_eq!(key.public_key, keys.public_key_hex());
    assert_eq!(key.challenge.as_deref(), Some(registration.payload.as_str()));

    // Idempotent
    assert_eq!(sumsy.system().register(&registration).await.unwrap(), ledger);
    let system = sumsy.ledger(SYSTEM).current().await.unwrap().unwrap();
    assert_eq!(system.sequence, 1);
}

#[tokio::test]
async fn test_register_rejections() {
    let (_table, sumsy) = initialized().await;
    let template = sumsy.system().challenge().await.unwrap();

    // Non-zero amount
    let keys = KeyPair::generate();
    let greedy = template.replace("/0,00 ɱ", "/1000,00 ɱ");
    let registration = Registration::sign(&keys, &greedy, None).unwrap();
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Signed by a different key
    let mallory = KeyPair::generate();
    let mut registration = Registration::sign(&keys, &template, None).unwrap();
    let forged = Registration::sign(&mallory, &template, None).unwrap();
    registration.signature = forged.signature;
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

    // Payload for someone else's fingerprint
    let mut registration = Registration::sign(&keys, &template, None).unwrap();
    registration.public_key = mallory.public_key_hex();
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Malformed key
    let mut registration = Registration::sign(&keys, &template, None).unwrap();
    registration.public_key = "not-a-key".to_string();
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);

    // Stale template: the system chain moved on
    register(&sumsy, "bob").await;
    let late = KeyPair::generate();
    let registration = Registration::sign(&late, &template, None).unwrap();
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainConflict);

    assert!(sumsy.ledger(keys.fingerprint()).current().await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_before_init() {
    let sumsy = sumsy_on(Arc::new(MemoryTable::new()));
    let keys = KeyPair::generate();
    let template = sumsy.system().challenge().await.unwrap();
    let registration = Registration::sign(&keys, &template, None).unwrap();

    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert!(matches!(err, TransactionError::NotInitialized));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Test: A (balance 100) pays B 30, B confirms
#[tokio::test]
async fn test_transfer_create_and_confirm() -> anyhow::Result<()> {
    let (table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;
    assert_eq!(sumsy.ledger(&alice).current().await?.unwrap().balance, mani(100));

    let payload = transfer_payload(&sumsy, &alice, &bob, 30).await;
    assert_eq!(destructure(&payload, false)?.amount, Some(mani(-30)));
    // challenge stores nothing
    assert!(sumsy.ledger(&alice).pending().await?.is_none());

    let proof = Proof::sign(&alice_keys, &payload)?;
    let token = sumsy.ledger(&alice).create(&proof).await?;

    let alice_pending = sumsy.ledger(&alice).pending().await?.unwrap();
    assert_eq!(alice_pending.amount, mani(-30));
    assert_eq!(alice_pending.balance, mani(70));
    assert_eq!(alice_pending.next.as_deref(), Some(token.as_str()));
    assert!(alice_pending.counter_signature.is_none());

    let bob_pending = sumsy.ledger(&bob).pending().await?.unwrap();
    assert_eq!(bob_pending.amount, mani(30));
    assert_eq!(bob_pending.balance, mani(30));
    assert_eq!(bob_pending.challenge.as_deref(), Some(flip(&payload)?.as_str()));
    assert!(bob_pending.counter_signature.is_some());

    // Creating again returns the same token without writing
    let stored = table.len();
    let alice_item = table.get_item(&ItemKey::new(alice.as_str(), PENDING)).await?;
    let bob_item = table.get_item(&ItemKey::new(bob.as_str(), PENDING)).await?;
    assert_eq!(sumsy.ledger(&alice).create(&proof).await?, token);
    assert_eq!(table.len(), stored);
    assert_eq!(table.get_item(&ItemKey::new(alice.as_str(), PENDING)).await?, alice_item);
    assert_eq!(table.get_item(&ItemKey::new(bob.as_str(), PENDING)).await?, bob_item);

    let bob_token = confirm_pending(&sumsy, &bob_keys, &bob).await;

    let alice_current = sumsy.ledger(&alice).current().await?.unwrap();
    let bob_current = sumsy.ledger(&bob).current().await?.unwrap();
    assert_eq!(alice_current.balance, mani(70));
    assert_eq!(bob_current.balance, mani(30));
    assert_eq!(alice_current.amount, -bob_current.amount);
    for entry in [&alice_current, &bob_current] {
        assert_eq!(entry.entry, EntryState::Current);
        assert!(entry.signature.is_some() && entry.counter_signature.is_some());
    }
    assert_eq!(bob_current.next.as_deref(), Some(bob_token.as_str()));
    assert!(sumsy.ledger(&alice).pending().await?.is_none());
    assert!(sumsy.ledger(&bob).pending().await?.is_none());

    // Confirming again is idempotent
    let bob_proof = Proof::sign(&bob_keys, bob_current.challenge.as_deref().unwrap())?;
    assert_eq!(sumsy.ledger(&bob).confirm(&bob_proof).await?, bob_token);

    for ledger in [&alice, &bob, &SYSTEM.to_string()] {
        let chain = sumsy.ledgers().chain(ledger).await?;
        verify_chain(&chain)?;
    }
    Ok(())
}

#[tokio::test]
async fn test_transfer_rejections() {
    let (_table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (_bob_keys, bob) = register(&sumsy, "bob").await;
    let (_carol_keys, carol) = register(&sumsy, "carol").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let kind = |result: Result<String, TransactionError>| result.unwrap_err().kind();

    // Overdraft
    assert_eq!(
        kind(sumsy.ledger(&alice).challenge(&bob, mani(200)).await),
        ErrorKind::InsufficientBalance
    );
    // Not to the system, not to oneself, not nothing
    assert_eq!(kind(sumsy.ledger(&alice).challenge(SYSTEM, mani(1)).await), ErrorKind::Forbidden);
    assert_eq!(kind(sumsy.ledger(&alice).challenge(&alice, mani(1)).await), ErrorKind::Forbidden);
    assert_eq!(kind(sumsy.ledger(&alice).challenge(&bob, Mani::ZERO).await), ErrorKind::Forbidden);
    // Both sides must be registered
    assert_eq!(
        kind(sumsy.ledger(&alice).challenge("unregistered", mani(1)).await),
        ErrorKind::NotFound
    );
    assert_eq!(kind(sumsy.ledger("unregistered").challenge(&bob, mani(1)).await), ErrorKind::NotFound);

    // Forged chain position
    let payload = transfer_payload(&sumsy, &alice, &bob, 10).await;
    let mut forged = destructure(&payload, false).unwrap();
    forged.from.uid = "forged".to_string();
    let proof = Proof::sign(&alice_keys, &forged.encode()).unwrap();
    assert_eq!(kind(sumsy.ledger(&alice).create(&proof).await), ErrorKind::ChainConflict);

    // Someone else's payload
    let proof = Proof::sign(&alice_keys, &payload).unwrap();
    assert_eq!(kind(sumsy.ledger(&bob).create(&proof).await), ErrorKind::Forbidden);

    // Wrong key
    let mallory = KeyPair::generate();
    let proof = Proof::sign(&mallory, &payload).unwrap();
    assert_eq!(kind(sumsy.ledger(&alice).create(&proof).await), ErrorKind::SignatureInvalid);

    // Garbage
    let proof = Proof {
        payload: "/not/a/payload".to_string(),
        signature: String::new(),
        counter_signature: String::new(),
    };
    assert_eq!(kind(sumsy.ledger(&alice).create(&proof).await), ErrorKind::Parse);

    // One pending entry at a time
    let proof = Proof::sign(&alice_keys, &payload).unwrap();
    sumsy.ledger(&alice).create(&proof).await.unwrap();
    assert_eq!(
        kind(sumsy.ledger(&alice).challenge(&carol, mani(5)).await),
        ErrorKind::ChainConflict
    );
    // Nor can anyone pay into a ledger that has one
    assert_eq!(
        kind(sumsy.ledger(&carol).challenge(&bob, mani(5)).await),
        ErrorKind::ChainConflict
    );
}

#[tokio::test]
async fn test_cancel() {
    let (_table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (_bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let payload = transfer_payload(&sumsy, &alice, &bob, 30).await;
    sumsy
        .ledger(&alice)
        .create(&Proof::sign(&alice_keys, &payload).unwrap())
        .await
        .unwrap();

    assert_eq!(
        sumsy.ledger(&alice).cancel("/something/else").await.unwrap(),
        CancelOutcome::NothingToCancel
    );
    assert!(sumsy.ledger(&alice).pending().await.unwrap().is_some());

    assert_eq!(
        sumsy.ledger(&alice).cancel(&payload).await.unwrap(),
        CancelOutcome::Cancelled
    );
    assert!(sumsy.ledger(&alice).pending().await.unwrap().is_none());
    assert!(sumsy.ledger(&bob).pending().await.unwrap().is_none());
    assert_eq!(
        sumsy.ledger(&alice).cancel(&payload).await.unwrap(),
        CancelOutcome::NothingToCancel
    );

    // Balance untouched, a new transfer can start
    assert_eq!(sumsy.ledger(&alice).current().await.unwrap().unwrap().balance, mani(100));
    assert!(sumsy.ledger(&alice).challenge(&bob, mani(30)).await.is_ok());
}

#[tokio::test]
async fn test_cancel_system_transfer_refused() {
    let (_table, sumsy) = initialized().await;
    let (_alice_keys, alice) = register(&sumsy, "alice").await;
    sumsy.system().jubilee(Some(&alice)).await.unwrap();

    let pending = sumsy.ledger(&alice).pending().await.unwrap().unwrap();
    assert_eq!(pending.destination.as_deref(), Some(SYSTEM));

    let err = sumsy
        .ledger(&alice)
        .cancel(pending.challenge.as_deref().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(sumsy.ledger(&alice).pending().await.unwrap(), Some(pending));
}

#[tokio::test]
async fn test_cancel_without_counterpart_pending() {
    let (table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (_bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let payload = transfer_payload(&sumsy, &alice, &bob, 30).await;
    sumsy
        .ledger(&alice)
        .create(&Proof::sign(&alice_keys, &payload).unwrap())
        .await
        .unwrap();
    table
        .delete_item(&ItemKey::new(bob.as_str(), PENDING))
        .await
        .unwrap();

    let err = sumsy.ledger(&alice).cancel(&payload).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(sumsy.ledger(&alice).pending().await.unwrap().is_some());
}

/// Test: jubilee on balance B gives B - B*R/100 + I, mirrored on system
#[tokio::test]
async fn test_jubilee_arithmetic() {
    let (_table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let system_before = sumsy.ledger(SYSTEM).current().await.unwrap().unwrap();
    let summary = sumsy.system().jubilee(Some(&alice)).await.unwrap();
    assert_eq!(summary.ledgers, 1);
    assert_eq!(summary.demurrage, mani(5));
    assert_eq!(summary.income, mani(100));

    let pending = sumsy.ledger(&alice).pending().await.unwrap().unwrap();
    assert_eq!(pending.demurrage, Some(mani(5)));
    assert_eq!(pending.income, Some(mani(100)));
    assert_eq!(pending.amount, mani(95));
    assert_eq!(pending.balance, mani(195));

    let system = sumsy.ledger(SYSTEM).current().await.unwrap().unwrap();
    assert_eq!(system.amount, -pending.amount);
    assert_eq!(system.balance, system_before.balance.subtract(&mani(95)).unwrap());
    assert_eq!(system.demurrage, Some(mani(-5)));
    assert_eq!(system.income, Some(mani(-100)));

    confirm_pending(&sumsy, &alice_keys, &alice).await;
    assert_eq!(sumsy.ledger(&alice).current().await.unwrap().unwrap().balance, mani(195));
    // The committed system entry was not rewritten
    assert_eq!(sumsy.ledger(SYSTEM).current().await.unwrap().unwrap(), system);
}

#[tokio::test]
async fn test_jubilee_batch_skips_and_continues() {
    let (table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (bob_keys, bob) = register(&sumsy, "bob").await;
    let (_carol_keys, carol) = register(&sumsy, "carol").await;
    fund(&sumsy, &alice_keys, &alice).await;
    // carol has not confirmed the first jubilee yet
    sumsy.system().jubilee(Some(&carol)).await.unwrap();

    let directory = StaticDirectory::new([
        alice.clone(),
        SYSTEM.to_string(),
        "unregistered".to_string(),
        carol.clone(),
        bob.clone(),
    ]);
    let batch = Sumsy::new(Arc::clone(&table) as Arc<dyn Table>, Arc::new(directory), EngineConfig::default());

    let summary = batch.system().jubilee(None).await.unwrap();
    assert_eq!(summary.ledgers, 2);
    assert_eq!(summary.demurrage, mani(5));
    assert_eq!(summary.income, mani(200));

    // Both can confirm, even though the system chain moved on since
    confirm_pending(&batch, &alice_keys, &alice).await;
    confirm_pending(&batch, &bob_keys, &bob).await;
    assert_eq!(batch.ledger(&alice).current().await.unwrap().unwrap().balance, mani(195));
    assert_eq!(batch.ledger(&bob).current().await.unwrap().unwrap().balance, mani(100));

    for ledger in [&alice, &bob, &SYSTEM.to_string()] {
        let chain = batch.ledgers().chain(ledger).await.unwrap();
        verify_chain(&chain).unwrap();
    }
}

#[tokio::test]
async fn test_jubilee_requires_init() {
    let sumsy = sumsy_on(Arc::new(MemoryTable::new()));
    let err = sumsy.system().jubilee(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_system_floor() {
    let table: Arc<dyn Table> = Arc::new(MemoryTable::new());
    let config = EngineConfig {
        system_floor: Some(mani(-150)),
        ..EngineConfig::default()
    };
    let sumsy = Sumsy::new(table, Arc::new(StaticDirectory::default()), config);
    sumsy.system().init().await.unwrap();
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (_bob_keys, bob) = register(&sumsy, "bob").await;

    fund(&sumsy, &alice_keys, &alice).await;
    let summary = sumsy.system().jubilee(Some(&bob)).await.unwrap();
    assert_eq!(summary.ledgers, 0);
    assert!(sumsy.ledger(&bob).pending().await.unwrap().is_none());
    assert_eq!(sumsy.ledger(SYSTEM).current().await.unwrap().unwrap().balance, mani(-100));
}

#[tokio::test]
async fn test_history_and_short_view() {
    let (_table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let history = sumsy.ledger(&alice).recent_history().await.unwrap();
    let sequences: Vec<i64> = history.iter().map(|entry| entry.sequence).collect();
    assert_eq!(sequences, vec![1, 0]);
    assert_eq!(history[0].entry, EntryState::Current);
    assert!(matches!(history[1].entry, EntryState::Archived(_)));

    let short = sumsy.ledger(&alice).short().current().await.unwrap().unwrap();
    assert!(short.signature.is_none());
    assert_eq!(short.balance, mani(100));
}

#[tokio::test]
async fn test_full_workflow_on_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let table: Arc<dyn Table> = Arc::new(SqliteTable::open(temp_dir.path().join("sumsy.db")).unwrap());
    let sumsy = sumsy_on(Arc::clone(&table));
    sumsy.system().init().await.unwrap();

    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let payload = transfer_payload(&sumsy, &alice, &bob, 45).await;
    sumsy
        .ledger(&alice)
        .create(&Proof::sign(&alice_keys, &payload).unwrap())
        .await
        .unwrap();
    confirm_pending(&sumsy, &bob_keys, &bob).await;

    // Reopen through a new facade on the same file
    let reopened = sumsy_on(Arc::new(SqliteTable::open(temp_dir.path().join("sumsy.db")).unwrap()));
    assert_eq!(reopened.ledger(&alice).current().await.unwrap().unwrap().balance, mani(55));
    assert_eq!(reopened.ledger(&bob).current().await.unwrap().unwrap().balance, mani(45));
    assert!(reopened.system().init().await.unwrap().is_none());

    let system = reopened.ledgers().chain(SYSTEM).await.unwrap();
    assert_eq!(system.len(), 4);
    verify_chain(&system).unwrap();
}

/// Sign a copy of `payload` carrying a different date
fn redated(keys: &KeyPair, payload: &str, date: chrono::DateTime<Utc>) -> Proof {
    let mut moved = destructure(payload, false).unwrap();
    moved.date = date;
    Proof::sign(keys, &moved.encode()).unwrap()
}

#[tokio::test]
async fn test_payload_dates_are_bounded() {
    let (table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;
    let stored = table.len();

    let payload = transfer_payload(&sumsy, &alice, &bob, 10).await;
    let backdated = redated(&alice_keys, &payload, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    let err = sumsy.ledger(&alice).create(&backdated).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainConflict);

    let future = redated(&alice_keys, &payload, date::now() + Duration::days(1));
    let err = sumsy.ledger(&alice).create(&future).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainConflict);

    // Registration payloads are held to the same rule
    let template = sumsy.system().challenge().await.unwrap();
    let carol_keys = KeyPair::generate();
    let mut registration = Registration::sign(&carol_keys, &template, None).unwrap();
    let backdated = redated(&carol_keys, &registration.payload, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    registration.payload = backdated.payload;
    registration.signature = backdated.signature;
    registration.counter_signature = backdated.counter_signature;
    let err = sumsy.system().register(&registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainConflict);

    assert_eq!(table.len(), stored);
    assert!(sumsy.ledger(&alice).pending().await.unwrap().is_none());

    // The undated path still works and the history stays in order
    sumsy
        .ledger(&alice)
        .create(&Proof::sign(&alice_keys, &payload).unwrap())
        .await
        .unwrap();
    confirm_pending(&sumsy, &bob_keys, &bob).await;

    let history = sumsy.ledger(&alice).recent_history().await.unwrap();
    let sequences: Vec<i64> = history.iter().map(|entry| entry.sequence).collect();
    assert_eq!(sequences, vec![2, 1, 0]);
    let chain = sumsy.ledgers().chain(&alice).await.unwrap();
    verify_chain(&chain).unwrap();
}

/// Two pipelines built from the same state: the store rejects the second
#[tokio::test]
async fn test_racing_commits_second_is_rejected() {
    let (table, sumsy) = initialized().await;
    let (alice_keys, alice) = register(&sumsy, "alice").await;
    let (bob_keys, bob) = register(&sumsy, "bob").await;
    fund(&sumsy, &alice_keys, &alice).await;

    let payload = transfer_payload(&sumsy, &alice, &bob, 30).await;
    sumsy
        .ledger(&alice)
        .create(&Proof::sign(&alice_keys, &payload).unwrap())
        .await
        .unwrap();

    let bob_pending = sumsy.ledger(&bob).pending().await.unwrap().unwrap();
    let proof = Proof::sign(&bob_keys, bob_pending.challenge.as_deref().unwrap()).unwrap();
    let config = Arc::new(sumsy.config().clone());

    let mut transactions = Vec::new();
    for _ in 0..2 {
        let mut transaction = sumsy.ledgers().transaction();
        StateMachine::new(sumsy.ledgers().clone(), Arc::clone(&config))
            .proposal(&proof.payload)
            .unwrap()
            .continue_pending()
            .await
            .unwrap()
            .add_signatures(Signatures::from_proof(bob.as_str(), &proof))
            .await
            .unwrap()
            .commit(&mut transaction)
            .unwrap();
        transactions.push(transaction);
    }
    let mut transactions = transactions.into_iter();
    let first = transactions.next().unwrap();
    let second = transactions.next().unwrap();

    first.execute().await.unwrap();
    let stored = table.len();
    let current = [
        table.get_item(&ItemKey::new(alice.as_str(), CURRENT)).await.unwrap(),
        table.get_item(&ItemKey::new(bob.as_str(), CURRENT)).await.unwrap(),
    ];

    let err = TransactionError::from(second.execute().await.unwrap_err());
    assert_eq!(err.kind(), ErrorKind::ChainConflict);

    assert_eq!(table.len(), stored);
    assert_eq!(
        [
            table.get_item(&ItemKey::new(alice.as_str(), CURRENT)).await.unwrap(),
            table.get_item(&ItemKey::new(bob.as_str(), CURRENT)).await.unwrap(),
        ],
        current
    );
    assert_eq!(sumsy.ledger(&bob).current().await.unwrap().unwrap().balance, mani(30));
}
