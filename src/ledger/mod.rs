//! Ledger client interface
//!
//! The three calls the sender needs from a ledger node: submit a message,
//! read account state, page through account history. Everything is read
//! fresh on every call; nothing here caches.
//!
//! Implementations:
//! - [`jrpc::JrpcLedgerClient`] - JSON-RPC gateway client
//! - [`mock::MockLedger`] - scripted test double (`mock-api` feature)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{Address, Hash256, Lt, UnixTime};
use crate::message::SignedMessage;
use crate::money::Amount;

pub mod jrpc;
#[cfg(any(test, feature = "mock-api"))]
pub mod mock;

pub use jrpc::{JrpcConfig, JrpcLedgerClient};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected RPC response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LedgerError::Decode(e.to_string())
        } else {
            LedgerError::Transport(e.to_string())
        }
    }
}

/// Transaction identifier. Also the history continuation cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub lt: Lt,
    pub hash: Hash256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Holds funds but the wallet code is not deployed yet
    Uninit,
    Active,
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub balance: Amount,
    pub status: AccountStatus,
    pub last_transaction_id: TransactionId,
    /// Ledger time of the shard block this state was read from
    pub gen_utime: UnixTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub hash: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutMessage {
    pub hash: Hash256,
    #[serde(default)]
    pub dst: Option<Address>,
    pub value: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Absent only for the account's very first transaction
    #[serde(default)]
    pub prev_transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub in_message: Option<MessageRef>,
    #[serde(default)]
    pub out_messages: Vec<OutMessage>,
}

impl TransactionRecord {
    pub fn in_message_hash(&self) -> Option<&Hash256> {
        self.in_message.as_ref().map(|m| &m.hash)
    }
}

/// One page of account history, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsBatch {
    pub transactions: Vec<TransactionRecord>,
    /// Cursor for the next older page, `None` when history is exhausted
    #[serde(default)]
    pub continuation: Option<TransactionId>,
}

/// Ledger RPC capability
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Deliver a signed external message to `dst`.
    ///
    /// Blocks until the message is seen in a transaction (`Some`) or ledger
    /// time passes `expire_at` (`None`). `None` is ambiguous: the message may
    /// have landed in an earlier attempt the client did not watch.
    async fn submit_message(
        &self,
        dst: &Address,
        message: &SignedMessage,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Current state, `None` when the account does not exist.
    async fn get_account_state(
        &self,
        address: &Address,
    ) -> Result<Option<AccountState>, LedgerError>;

    /// History page starting at `continuation` (inclusive), newest first.
    async fn get_transactions(
        &self,
        address: &Address,
        limit: u8,
        continuation: Option<TransactionId>,
    ) -> Result<TransactionsBatch, LedgerError>;
}
