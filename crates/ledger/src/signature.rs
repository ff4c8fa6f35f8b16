//! Ed25519 keys and signatures over payload text
//!
//! A ledger id is the fingerprint of its owner's public key. Signatures
//! and keys travel hex-encoded.

use crate::error::LedgerError;
use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier as DalekVerifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in a fingerprint
pub const FINGERPRINT_BYTES: usize = 20;

/// Ledger id for a raw public key: hex of the first 20 bytes of its SHA-256
pub fn fingerprint(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..FINGERPRINT_BYTES])
}

/// Trait for signers
pub trait Signer: Send + Sync {
    /// Public key (hex-encoded)
    fn public_key_hex(&self) -> String;

    /// Ledger id derived from the public key
    fn fingerprint(&self) -> String;

    /// Sign text and return the hex signature
    fn sign(&self, text: &str) -> String;
}

/// Ed25519 key pair held by a ledger owner or by the system
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random signing key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed (hex-encoded)
    pub fn from_hex(hex_seed: &str) -> Result<Self, LedgerError> {
        let bytes =
            hex::decode(hex_seed).map_err(|e| LedgerError::InvalidKey(format!("Invalid key hex: {}", e)))?;

        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::InvalidKey("Key must be 32 bytes".to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Export the seed as hex (for storage)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn verifier(&self) -> Verifier {
        Verifier {
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

impl Signer for KeyPair {
    fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    fn fingerprint(&self) -> String {
        fingerprint(self.signing_key.verifying_key().as_bytes())
    }

    fn sign(&self, text: &str) -> String {
        hex::encode(self.signing_key.sign(text.as_bytes()).to_bytes())
    }
}

/// Public half of a key pair
#[derive(Debug, Clone)]
pub struct Verifier {
    verifying_key: VerifyingKey,
}

impl Verifier {
    pub fn from_hex(public_key: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(public_key)
            .map_err(|e| LedgerError::InvalidKey(format!("Invalid public key hex: {}", e)))?;

        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::InvalidKey("Public key must be 32 bytes".to_string()))?;

        let verifying_key = VerifyingKey::from_bytes(&array)
            .map_err(|e| LedgerError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self { verifying_key })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.to_bytes())
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.verifying_key.as_bytes())
    }

    /// Check a hex signature over `text`
    pub fn verify(&self, text: &str, signature: &str) -> Result<(), LedgerError> {
        let signer = self.fingerprint();

        let bytes = hex::decode(signature).map_err(|e| LedgerError::InvalidSignature {
            signer: signer.clone(),
            reason: format!("Invalid signature hex: {}", e),
        })?;

        let array: [u8; 64] = bytes.try_into().map_err(|_| LedgerError::InvalidSignature {
            signer: signer.clone(),
            reason: "Signature must be 64 bytes".to_string(),
        })?;

        self.verifying_key
            .verify(text.as_bytes(), &Signature::from_bytes(&array))
            .map_err(|e| {
                LedgerError::SignatureVerificationFailed(format!("Signature from {} failed: {}", signer, e))
            })
    }
}
