//! Signed client submissions
//!
//! Whoever submits a payload signs it twice: their own view (`signature`)
//! and the counterpart's flipped view (`counter_signature`).

use serde::{Deserialize, Serialize};
use sumsy_ledger::{flip, LedgerError, Signer};

/// Placeholder for the ledger id in registration templates
pub const FINGERPRINT_PLACEHOLDER: &str = "<fingerprint>";

/// A signed transfer payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub payload: String,
    pub signature: String,
    pub counter_signature: String,
}

impl Proof {
    pub fn sign(keys: &dyn Signer, payload: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            payload: payload.to_string(),
            signature: keys.sign(payload),
            counter_signature: keys.sign(&flip(payload)?),
        })
    }
}

/// Request to open a new ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Hex-encoded Ed25519 public key; its fingerprint is the new ledger id
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub payload: String,
    pub signature: String,
    pub counter_signature: String,
}

impl Registration {
    /// Fill the system's registration template and sign it
    pub fn sign(keys: &dyn Signer, template: &str, alias: Option<&str>) -> Result<Self, LedgerError> {
        let payload = template.replace(FINGERPRINT_PLACEHOLDER, &keys.fingerprint());
        let proof = Proof::sign(keys, &payload)?;
        Ok(Self {
            public_key: keys.public_key_hex(),
            alias: alias.map(str::to_string),
            payload: proof.payload,
            signature: proof.signature,
            counter_signature: proof.counter_signature,
        })
    }
}

/// Signatures attached to a pipeline by an external party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signatures {
    /// Ledger the signer owns; must be the primary role
    pub ledger: String,
    pub signature: String,
    pub counter_signature: String,
    /// Key to verify with instead of the registered one
    pub public_key: Option<String>,
}

impl Signatures {
    pub fn from_proof(ledger: impl Into<String>, proof: &Proof) -> Self {
        Self {
            ledger: ledger.into(),
            signature: proof.signature.clone(),
            counter_signature: proof.counter_signature.clone(),
            public_key: None,
        }
    }

    pub fn from_registration(ledger: impl Into<String>, registration: &Registration) -> Self {
        Self {
            ledger: ledger.into(),
            signature: registration.signature.clone(),
            counter_signature: registration.counter_signature.clone(),
            public_key: Some(registration.public_key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sumsy_ledger::KeyPair;

    const TEMPLATE: &str =
        "/2021-03-01T12:00:00.000Z/from/<fingerprint>/000000000000/init/to/system/000000000001/abc/0,00 ɱ";

    #[test]
    fn test_proof_signs_both_views() {
        let keys = KeyPair::generate();
        let payload = TEMPLATE.replace(FINGERPRINT_PLACEHOLDER, &keys.fingerprint());
        let proof = Proof::sign(&keys, &payload).unwrap();

        let verifier = keys.verifier();
        assert!(verifier.verify(&payload, &proof.signature).is_ok());
        assert!(verifier
            .verify(&flip(&payload).unwrap(), &proof.counter_signature)
            .is_ok());
    }

    #[test]
    fn test_registration_substitutes_fingerprint() {
        let keys = KeyPair::generate();
        let registration = Registration::sign(&keys, TEMPLATE, Some("alice")).unwrap();
        assert!(registration.payload.contains(&keys.fingerprint()));
        assert!(!registration.payload.contains(FINGERPRINT_PLACEHOLDER));
        assert_eq!(registration.alias.as_deref(), Some("alice"));
        assert_eq!(registration.public_key, keys.public_key_hex());
    }

    #[test]
    fn test_unsubstituted_template_cannot_be_signed() {
        let keys = KeyPair::generate();
        assert!(Proof::sign(&keys, TEMPLATE).is_err());
    }
}
