//! Pending transfer status
//!
//! ```text
//! (absent) ──create──▶ SENDING ──▶ SUCCESS
//!                         │
//!                         └──────▶ EXPIRE
//! ```
//!
//! Terminal: SUCCESS, EXPIRE. A terminal (or absent) record lets the next
//! run create a fresh transfer; SENDING forces resume.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Persisted before the first send; outcome unknown
    Sending,

    /// Terminal: included and produced an outbound transfer
    Success,

    /// Terminal: ledger time passed `expire_at` without inclusion
    Expire,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Success | TransferStatus::Expire)
    }

    /// Only SENDING may move, and only to a terminal state.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        *self == TransferStatus::Sending && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Sending => "sending",
            TransferStatus::Success => "success",
            TransferStatus::Expire => "expire",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
