//! Account directory: who takes part in the jubilee

use crate::error::{TransactionError, TransactionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A directory account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub ledger: String,
}

impl Account {
    pub fn new(ledger: impl Into<String>) -> Self {
        Self { ledger: ledger.into() }
    }
}

/// Source of ledgers eligible for batch operations
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_batch_eligible_accounts(&self) -> TransactionResult<Vec<Account>>;
}

/// Fixed in-memory list
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    accounts: Vec<Account>,
}

impl StaticDirectory {
    pub fn new(ledgers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            accounts: ledgers.into_iter().map(Account::new).collect(),
        }
    }
}

#[async_trait]
impl AccountDirectory for StaticDirectory {
    async fn list_batch_eligible_accounts(&self) -> TransactionResult<Vec<Account>> {
        Ok(self.accounts.clone())
    }
}

/// JSON file `[{"ledger": "<id>"}, ...]`, read on every listing
#[derive(Debug, Clone)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccountDirectory for FileDirectory {
    async fn list_batch_eligible_accounts(&self) -> TransactionResult<Vec<Account>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TransactionError::Directory(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| TransactionError::Directory(format!("{}: {}", self.path.display(), e)))
    }
}
