//! Message Builder
//!
//! Builds the unsigned, time-bounded transfer instruction and its canonical
//! digest. The digest is the idempotency key: the same persisted message is
//! resent after a crash and matched against `in_message.hash` in history.
//!
//! # Canonical encoding
//!
//! ```text
//! "XFER" | version u8
//! src: wc i8 | id [32]
//! dest: wc i8 | id [32]
//! value: len u32 LE | magnitude big-endian
//! bounce u8 | flags u8
//! payload: 0 | 1, len u32 LE, bytes
//! state_init: 0 | 1, len u32 LE, bytes
//! public_key [32] | created_at_ms u64 LE | expire_at u32 LE
//! ```
//!
//! Digest = SHA-256(canonical). Body on the wire = base64(canonical ‖ signature).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core_types::{Address, Hash256, UnixTime};
use crate::money::Amount;
use crate::signer::{Signer, SignerError, verify_signature};

const MAGIC: &[u8; 4] = b"XFER";
const ENCODING_VERSION: u8 = 1;

/// Pay transfer fees separately from the value, ignore action errors.
pub const DEFAULT_SEND_FLAGS: u8 = 3;

/// Hard upper bound for message lifetime. Short expiry keeps reconciliation cheap.
pub const MAX_TIMEOUT_SECS: u32 = 3600;

/// Upper bound for attached payload / state-init cells.
pub const MAX_ATTACHMENT_BYTES: usize = 16 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Transfer amount must be greater than zero")]
    ZeroAmount,

    #[error("Sender and recipient cannot be the same account")]
    SameAccount,

    #[error("Timeout must be in 1..={max} seconds, got {got}")]
    InvalidTimeout { got: u32, max: u32 },

    #[error("{field} too large: {len} bytes (max {max})")]
    AttachmentTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Malformed message body: {0}")]
    MalformedBody(String),
}

/// Caller-facing description of the transfer.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub src: Address,
    pub dest: Address,
    pub amount: Amount,
    pub bounce: bool,
    pub flags: u8,
    pub payload: Option<Vec<u8>>,
    pub state_init: Option<Vec<u8>>,
    /// Relative expiry in seconds
    pub timeout_secs: u32,
    pub public_key: [u8; 32],
}

/// Unsigned external message to the wallet contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedMessage {
    pub src: Address,
    pub dest: Address,
    pub value: Amount,
    pub bounce: bool,
    pub flags: u8,
    pub payload: Option<Vec<u8>>,
    pub state_init: Option<Vec<u8>>,
    pub public_key: [u8; 32],
    pub created_at_ms: u64,
    pub expire_at: UnixTime,
}

impl UnsignedMessage {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(160);
        buf.extend_from_slice(MAGIC);
        buf.push(ENCODING_VERSION);

        for addr in [&self.src, &self.dest] {
            buf.push(addr.workchain as u8);
            buf.extend_from_slice(&addr.account_id);
        }

        encode_length_prefixed(&mut buf, &self.value.to_bytes_be());
        buf.push(self.bounce as u8);
        buf.push(self.flags);
        encode_optional(&mut buf, self.payload.as_deref());
        encode_optional(&mut buf, self.state_init.as_deref());

        buf.extend_from_slice(&self.public_key);
        buf.extend_from_slice(&self.created_at_ms.to_le_bytes());
        buf.extend_from_slice(&self.expire_at.to_le_bytes());
        buf
    }

    /// Deterministic digest of the message
    pub fn hash(&self) -> Hash256 {
        Hash256(Sha256::digest(self.canonical_bytes()).into())
    }

    /// Sign the digest and produce the persisted/sendable form.
    pub fn sign(
        &self,
        signer: &dyn Signer,
        network_id: Option<i32>,
    ) -> Result<SignedMessage, SignerError> {
        let canonical = self.canonical_bytes();
        let hash = Hash256(Sha256::digest(&canonical).into());
        let signature = signer.sign(hash.as_bytes(), network_id)?;

        let mut body = canonical;
        body.extend_from_slice(&signature);

        Ok(SignedMessage {
            hash,
            expire_at: self.expire_at,
            src: self.src,
            dest: self.dest,
            value: self.value.clone(),
            network_id,
            body: BASE64.encode(body),
        })
    }
}

fn encode_length_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

fn encode_optional(buf: &mut Vec<u8>, data: Option<&[u8]>) {
    match data {
        Some(bytes) => {
            buf.push(1);
            encode_length_prefixed(buf, bytes);
        }
        None => buf.push(0),
    }
}

/// Signed message as persisted and as handed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// Message digest, the idempotency key
    pub hash: Hash256,
    /// Ledger time after which the message can no longer be included
    pub expire_at: UnixTime,
    pub src: Address,
    pub dest: Address,
    pub value: Amount,
    #[serde(default)]
    pub network_id: Option<i32>,
    /// base64(canonical ‖ signature)
    pub body: String,
}

impl SignedMessage {
    /// Split the body into canonical bytes and signature.
    pub fn decode_body(&self) -> Result<(Vec<u8>, [u8; 64]), MessageError> {
        let mut raw = BASE64
            .decode(&self.body)
            .map_err(|e| MessageError::MalformedBody(e.to_string()))?;
        if raw.len() < MAGIC.len() + 1 + 64 || !raw.starts_with(MAGIC) {
            return Err(MessageError::MalformedBody("truncated or bad magic".into()));
        }

        let sig_bytes = raw.split_off(raw.len() - 64);
        let signature: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| MessageError::MalformedBody("signature length".into()))?;
        Ok((raw, signature))
    }

    /// Check that the body hashes to `hash` and is signed by `public_key`.
    ///
    /// Run on resume, so a tampered or truncated record is never resent.
    pub fn verify(&self, public_key: &[u8; 32]) -> Result<(), MessageError> {
        let (canonical, signature) = self.decode_body()?;
        let digest: [u8; 32] = Sha256::digest(&canonical).into();
        if digest != self.hash.0 {
            return Err(MessageError::MalformedBody(format!(
                "body digest {} does not match hash {}",
                hex::encode(digest),
                self.hash
            )));
        }
        if !verify_signature(public_key, &digest, self.network_id, &signature) {
            return Err(MessageError::MalformedBody("signature check failed".into()));
        }
        Ok(())
    }
}

// ============================================================
// Builder
// ============================================================

/// Builds expiring messages. Time source is injectable for tests.
pub struct MessageBuilder {
    now_ms_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            now_ms_fn: Box::new(|| chrono::Utc::now().timestamp_millis().max(0) as u64),
        }
    }

    /// Set the current time function (milliseconds)
    pub fn with_time_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.now_ms_fn = Box::new(f);
        self
    }

    /// Validate params and build the unsigned message with absolute expiry.
    pub fn prepare(&self, params: &TransferParams) -> Result<UnsignedMessage, MessageError> {
        if params.amount.is_zero() {
            return Err(MessageError::ZeroAmount);
        }
        if params.src == params.dest {
            return Err(MessageError::SameAccount);
        }
        if params.timeout_secs == 0 || params.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(MessageError::InvalidTimeout {
                got: params.timeout_secs,
                max: MAX_TIMEOUT_SECS,
            });
        }
        for (field, data) in [
            ("payload", &params.payload),
            ("state_init", &params.state_init),
        ] {
            if let Some(bytes) = data
                && bytes.len() > MAX_ATTACHMENT_BYTES
            {
                return Err(MessageError::AttachmentTooLarge {
                    field,
                    len: bytes.len(),
                    max: MAX_ATTACHMENT_BYTES,
                });
            }
        }

        let now_ms = (self.now_ms_fn)();
        let now_secs = (now_ms / 1000) as UnixTime;

        Ok(UnsignedMessage {
            src: params.src,
            dest: params.dest,
            value: params.amount.clone(),
            bounce: params.bounce,
            flags: params.flags,
            payload: params.payload.clone(),
            state_init: params.state_init.clone(),
            public_key: params.public_key,
            created_at_ms: now_ms,
            expire_at: now_secs.saturating_add(params.timeout_secs),
        })
    }
}
