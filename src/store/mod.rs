//! Pending-Transfer Store
//!
//! Durable single-slot record of the in-flight transfer.
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Send**: the SENDING record is durable before the
//!    message is handed to the ledger. A failed write aborts the cycle.
//! 2. **Single Slot**: at most one record; a new transfer overwrites only a
//!    terminal one.
//! 3. **Versioned Schema**: records are wrapped in a checksummed envelope;
//!    unknown versions are refused rather than guessed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core_types::{Hash256, Lt};
use crate::message::SignedMessage;

pub mod codec;
pub mod file;
#[cfg(any(test, feature = "mock-api"))]
pub mod memory;
pub mod state;

pub use file::FileStore;
pub use state::TransferStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt pending record: {0}")]
    Corrupt(String),

    #[error("Unsupported record format version {0}")]
    UnsupportedVersion(u32),
}

/// The sole persisted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub signed_message: SignedMessage,
    /// Account lt observed right before the first send
    pub lt_before: Lt,
    pub status: TransferStatus,
    pub tx_hash: Option<Hash256>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn new(signed_message: SignedMessage, lt_before: Lt) -> Self {
        let now = Utc::now();
        Self {
            signed_message,
            lt_before,
            status: TransferStatus::Sending,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message_hash(&self) -> &Hash256 {
        &self.signed_message.hash
    }
}

/// Byte-level durable medium (file, embedded db, remote kv).
pub trait DurableStore: Send + Sync {
    fn read_pending(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Must not return before the bytes are durable.
    fn write_pending(&self, bytes: &[u8]) -> Result<(), StoreError>;
}

/// `DurableStore` for a shared handle, so tests can keep inspecting the
/// store after moving it into an engine.
impl<T: DurableStore + ?Sized> DurableStore for Arc<T> {
    fn read_pending(&self) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read_pending()
    }

    fn write_pending(&self, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write_pending(bytes)
    }
}

/// Typed load/save over a [`DurableStore`]
pub struct PendingTransferStore<S> {
    medium: S,
}

impl<S: DurableStore> PendingTransferStore<S> {
    pub fn new(medium: S) -> Self {
        Self { medium }
    }

    pub fn load(&self) -> Result<Option<PendingTransfer>, StoreError> {
        match self.medium.read_pending()? {
            Some(bytes) => codec::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn save(&self, transfer: &PendingTransfer) -> Result<(), StoreError> {
        let bytes = codec::encode(transfer)?;
        self.medium.write_pending(&bytes)
    }

    pub fn medium(&self) -> &S {
        &self.medium
    }
}
