//! Ed25519 signing for outgoing messages.
//!
//! The protocol core only sees the [`Signer`] trait. [`Keystore`] keeps
//! signing keys in memory and hands out a signer by public key, the same
//! way a wallet keystore resolves the key for a given account.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("No signing key for public key {0}")]
    KeyNotFound(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Keystore IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keystore parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Signing capability for a single public key.
pub trait Signer: Send + Sync {
    /// 32-byte Ed25519 public key
    fn public_key(&self) -> [u8; 32];

    /// Sign a message digest.
    ///
    /// With `network_id` the signed data is `network_id (BE) ‖ digest`, so the
    /// signature is only valid on that network.
    fn sign(&self, digest: &[u8], network_id: Option<i32>) -> Result<[u8; 64], SignerError>;
}

/// Bytes actually covered by the signature.
pub fn signing_data(digest: &[u8], network_id: Option<i32>) -> Vec<u8> {
    match network_id {
        Some(id) => {
            let mut data = Vec::with_capacity(4 + digest.len());
            data.extend_from_slice(&id.to_be_bytes());
            data.extend_from_slice(digest);
            data
        }
        None => digest.to_vec(),
    }
}

/// Verify an Ed25519 signature over a digest.
///
/// Returns `false` on malformed key/signature lengths instead of erroring.
pub fn verify_signature(
    public_key: &[u8],
    digest: &[u8],
    network_id: Option<i32>,
    signature: &[u8],
) -> bool {
    let pk_bytes: [u8; 32] = match public_key.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let verifying_key = match VerifyingKey::from_bytes(&pk_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(&signing_data(digest, network_id), &sig)
        .is_ok()
}

// ============================================================
// Keystore
// ============================================================

/// In-memory Ed25519 key
pub struct KeyPairSigner {
    signing_key: SigningKey,
}

impl KeyPairSigner {
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, SignerError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| SignerError::InvalidKey(format!("secret key hex: {}", e)))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignerError::InvalidKey("secret key must be 32 bytes".into()))?;
        Ok(Self::from_secret(&secret))
    }

    /// Fresh random keypair (used by `--keygen`).
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.as_bytes())
    }
}

impl Signer for KeyPairSigner {
    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign(&self, digest: &[u8], network_id: Option<i32>) -> Result<[u8; 64], SignerError> {
        let signature = self.signing_key.sign(&signing_data(digest, network_id));
        Ok(signature.to_bytes())
    }
}

#[derive(Debug, Deserialize)]
struct KeystoreEntry {
    public_key: String,
    secret_key: String,
}

/// Signing keys indexed by public key
#[derive(Default)]
pub struct Keystore {
    keys: HashMap<[u8; 32], KeyPairSigner>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `[{ "public_key": hex, "secret_key": hex }, ...]` from a JSON file.
    ///
    /// Every entry's public key must match its secret key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SignerError> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<KeystoreEntry> = serde_json::from_str(&content)?;

        let mut keystore = Self::new();
        for entry in entries {
            let signer = KeyPairSigner::from_secret_hex(&entry.secret_key)?;
            let derived = hex::encode(signer.public_key());
            if !derived.eq_ignore_ascii_case(entry.public_key.trim()) {
                return Err(SignerError::InvalidKey(format!(
                    "public key {} does not match its secret key",
                    entry.public_key
                )));
            }
            keystore.add_key_pair(signer);
        }
        Ok(keystore)
    }

    pub fn add_key_pair(&mut self, signer: KeyPairSigner) {
        self.keys.insert(signer.public_key(), signer);
    }

    pub fn get_signer(&self, public_key: &[u8; 32]) -> Result<&KeyPairSigner, SignerError> {
        self.keys
            .get(public_key)
            .ok_or_else(|| SignerError::KeyNotFound(hex::encode(public_key)))
    }

    /// Remove and return the signer, so it can be moved into the engine.
    pub fn take_signer(&mut self, public_key: &[u8; 32]) -> Result<KeyPairSigner, SignerError> {
        self.keys
            .remove(public_key)
            .ok_or_else(|| SignerError::KeyNotFound(hex::encode(public_key)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
