//! CLI commands

use std::path::Path;
use sumsy_core::Mani;
use sumsy_engine::{CancelOutcome, Proof, Registration};
use sumsy_ledger::{verify_chain, Entry, Signer, Verifier};

use crate::context::AppContext;
use crate::keyfile;

fn print_entry(entry: &Entry) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(entry)?);
    Ok(())
}

/// Initialize the system ledger and parameters
pub async fn init(ctx: &AppContext) -> Result<(), anyhow::Error> {
    match ctx.sumsy.system().init().await? {
        Some(parameters) => println!(
            "✅ System initialized (income {}, demurrage {}%)",
            parameters.income, parameters.demurrage
        ),
        None => println!("System already initialized"),
    }
    Ok(())
}

pub async fn parameters(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let parameters = ctx
        .sumsy
        .system()
        .parameters()
        .await?
        .ok_or_else(|| anyhow::anyhow!("System not initialized"))?;
    println!("{}", serde_json::to_string_pretty(&parameters)?);
    Ok(())
}

/// Generate a client key file
pub fn keygen(output: &Path) -> Result<(), anyhow::Error> {
    let keys = sumsy_ledger::KeyPair::generate();
    keyfile::save(output, &keys)?;
    println!("✅ Generated key for ledger {}", keys.fingerprint());
    println!("   Saved to: {}", output.display());
    Ok(())
}

/// Sign the system's registration template and open the ledger
pub async fn register(ctx: &AppContext, key: &Path, alias: Option<&str>) -> Result<(), anyhow::Error> {
    let keys = keyfile::load(key)?;
    let template = ctx.sumsy.system().challenge().await?;
    let registration = Registration::sign(&keys, &template, alias)?;
    let ledger = ctx.sumsy.system().register(&registration).await?;
    println!("✅ Registered ledger {}", ledger);
    Ok(())
}

/// Challenge, sign and create a transfer in one go
pub async fn transfer(ctx: &AppContext, key: &Path, destination: &str, amount: Mani) -> Result<(), anyhow::Error> {
    let keys = keyfile::load(key)?;
    let ledger = ctx.sumsy.ledger(keys.fingerprint());
    let payload = ledger.challenge(destination, amount).await?;
    let token = ledger.create(&Proof::sign(&keys, &payload)?).await?;
    println!("✅ Transfer of {} to {} is pending", amount, destination);
    println!("   Token: {}", token);
    Ok(())
}

/// Sign whatever is pending on the caller's ledger
pub async fn confirm(ctx: &AppContext, key: &Path) -> Result<(), anyhow::Error> {
    let keys = keyfile::load(key)?;
    let ledger = ctx.sumsy.ledger(keys.fingerprint());
    let challenge = ledger
        .pending()
        .await?
        .and_then(|pending| pending.challenge)
        .ok_or_else(|| anyhow::anyhow!("Nothing pending on {}", ledger.fingerprint()))?;
    let token = ledger.confirm(&Proof::sign(&keys, &challenge)?).await?;
    println!("✅ Confirmed (token: {})", token);
    Ok(())
}

pub async fn cancel(ctx: &AppContext, key: &Path) -> Result<(), anyhow::Error> {
    let keys = keyfile::load(key)?;
    let ledger = ctx.sumsy.ledger(keys.fingerprint());
    let Some(challenge) = ledger.pending().await?.and_then(|pending| pending.challenge) else {
        println!("Nothing to cancel");
        return Ok(());
    };
    match ledger.cancel(&challenge).await? {
        CancelOutcome::Cancelled => println!("✅ Pending transfer cancelled"),
        CancelOutcome::NothingToCancel => println!("Nothing to cancel"),
    }
    Ok(())
}

pub async fn current(ctx: &AppContext, ledger: &str) -> Result<(), anyhow::Error> {
    match ctx.sumsy.ledger(ledger).current().await? {
        Some(entry) => print_entry(&entry)?,
        None => println!("Ledger {} is not registered", ledger),
    }
    Ok(())
}

pub async fn pending(ctx: &AppContext, ledger: &str) -> Result<(), anyhow::Error> {
    match ctx.sumsy.ledger(ledger).pending().await? {
        Some(entry) => print_entry(&entry)?,
        None => println!("Nothing pending on {}", ledger),
    }
    Ok(())
}

/// Most recent entries, newest first, without signatures
pub async fn history(ctx: &AppContext, ledger: &str) -> Result<(), anyhow::Error> {
    let entries = ctx.sumsy.ledger(ledger).short().recent_history().await?;
    if entries.is_empty() {
        println!("No history for {}", ledger);
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:>6}  {}  {:>14}  {:>14}  {}",
            entry.sequence,
            entry.date.format("%Y-%m-%d %H:%M:%S"),
            entry.amount.format(),
            entry.balance.format(),
            entry.destination.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn find_key(ctx: &AppContext, ledger: &str) -> Result<(), anyhow::Error> {
    match ctx.sumsy.system().find_key(ledger).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No key registered for {}", ledger),
    }
    Ok(())
}

pub async fn jubilee(ctx: &AppContext, ledger: Option<&str>) -> Result<(), anyhow::Error> {
    let summary = ctx.sumsy.system().jubilee(ledger).await?;
    println!(
        "✅ Jubilee applied to {} ledger(s): demurrage {}, income {}",
        summary.ledgers, summary.demurrage, summary.income
    );
    Ok(())
}

/// Verify a ledger's hash chain and, optionally, each entry's signature
pub async fn audit(ctx: &AppContext, ledger: &str, verify_signatures: bool) -> Result<(), anyhow::Error> {
    let entries = ctx.sumsy.ledgers().chain(ledger).await?;
    if entries.is_empty() {
        println!("No entries for {}", ledger);
        return Ok(());
    }

    match verify_chain(&entries) {
        Ok(()) => println!("✅ Hash chain verified ({} entries)", entries.len()),
        Err(e) => {
            println!("❌ Hash chain broken: {}", e);
            return Ok(());
        }
    }

    if verify_signatures {
        let record = ctx
            .sumsy
            .system()
            .find_key(ledger)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No key registered for {}", ledger))?;
        let verifier = Verifier::from_hex(&record.public_key)?;

        for entry in &entries {
            let (Some(challenge), Some(signature)) = (&entry.challenge, &entry.signature) else {
                println!("❌ Entry {} is not signed", entry.sequence);
                return Ok(());
            };
            if let Err(e) = verifier.verify(challenge, signature) {
                println!("❌ Signature verification failed at seq {}: {}", entry.sequence, e);
                return Ok(());
            }
        }
        println!("✅ Signatures verified ({} entries)", entries.len());
    }
    Ok(())
}
