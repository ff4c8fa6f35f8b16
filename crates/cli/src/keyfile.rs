//! Key files holding a client's Ed25519 seed

use serde::{Deserialize, Serialize};
use std::path::Path;
use sumsy_ledger::{KeyPair, Signer};

/// On-disk form of a key pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    pub ledger: String,
    pub public_key: String,
    pub seed: String,
}

impl KeyFile {
    pub fn from_keys(keys: &KeyPair) -> Self {
        Self {
            ledger: keys.fingerprint(),
            public_key: keys.public_key_hex(),
            seed: keys.seed_hex(),
        }
    }

    pub fn keys(&self) -> anyhow::Result<KeyPair> {
        let keys = KeyPair::from_hex(&self.seed)?;
        if keys.public_key_hex() != self.public_key {
            anyhow::bail!("key file public key does not match its seed");
        }
        Ok(keys)
    }
}

/// Write a new key file; refuses to overwrite an existing one
pub fn save(path: &Path, keys: &KeyPair) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let content = serde_json::to_string_pretty(&KeyFile::from_keys(keys))?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load(path: &Path) -> anyhow::Result<KeyPair> {
    let content = std::fs::read_to_string(path)?;
    let file: KeyFile = serde_json::from_str(&content)?;
    file.keys()
}
