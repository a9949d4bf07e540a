//! Sender Error Types
//!
//! One variant per failure kind. None are retried inside a run: the next
//! process run is the retry, made safe by resending the persisted message.

use thiserror::Error;

use crate::core_types::{AddressError, Hash256, Lt, UnixTime};
use crate::ledger::LedgerError;
use crate::message::MessageError;
use crate::money::{Amount, MoneyError};
use crate::signer::SignerError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SenderError {
    // === Caller Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    // === Storage ===
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    // === Data Source Integrity ===
    #[error(
        "Unreachable state: ledger time {gen_utime} is before message expiry {expire_at} after a final send"
    )]
    UnreachableState {
        gen_utime: UnixTime,
        expire_at: UnixTime,
    },

    #[error("Account state unavailable during reconciliation")]
    AccountVanished,

    #[error("Broken transaction chain: {0}")]
    BrokenChain(String),

    #[error("History gap: lt {lt_before} not reached after {pages} pages")]
    HistoryGap { lt_before: Lt, pages: usize },

    // === Outcome ===
    #[error("Transaction {tx_hash} consumed the message but produced no outbound transfer")]
    NoEffect { tx_hash: Hash256 },

    // === Collaborators ===
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
}

impl SenderError {
    /// Error kind name, printed on stderr by the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            SenderError::Validation(_) => "ValidationError",
            SenderError::InsufficientFunds { .. } => "InsufficientFundsError",
            SenderError::Persistence(_) => "PersistenceError",
            SenderError::UnreachableState { .. } | SenderError::AccountVanished => {
                "UnreachableStateError"
            }
            SenderError::BrokenChain(_) => "BrokenChainError",
            SenderError::HistoryGap { .. } => "HistoryGapError",
            SenderError::NoEffect { .. } => "NoEffectError",
            SenderError::Ledger(_) => "LedgerError",
            SenderError::Signer(_) => "SignerError",
        }
    }

    /// Process exit code for this kind
    pub fn exit_code(&self) -> i32 {
        match self {
            SenderError::Validation(_) => 2,
            SenderError::InsufficientFunds { .. } => 3,
            SenderError::Persistence(_) => 4,
            SenderError::UnreachableState { .. } | SenderError::AccountVanished => 5,
            SenderError::BrokenChain(_) => 6,
            SenderError::HistoryGap { .. } => 7,
            SenderError::NoEffect { .. } => 8,
            SenderError::Ledger(_) => 9,
            SenderError::Signer(_) => 10,
        }
    }

    /// Integrity violations of the ledger data source. Never masked.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            SenderError::UnreachableState { .. }
                | SenderError::AccountVanished
                | SenderError::BrokenChain(_)
                | SenderError::HistoryGap { .. }
        )
    }
}

impl From<MessageError> for SenderError {
    fn from(e: MessageError) -> Self {
        SenderError::Validation(e.to_string())
    }
}

impl From<MoneyError> for SenderError {
    fn from(e: MoneyError) -> Self {
        SenderError::Validation(e.to_string())
    }
}

impl From<AddressError> for SenderError {
    fn from(e: AddressError) -> Self {
        SenderError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_exit_codes() {
        let cases: Vec<(SenderError, &str, i32)> = vec![
            (SenderError::Validation("x".into()), "ValidationError", 2),
            (
                SenderError::InsufficientFunds {
                    required: Amount::from(2),
                    available: Amount::from(1),
                },
                "InsufficientFundsError",
                3,
            ),
            (
                SenderError::Persistence(StoreError::Corrupt("x".into())),
                "PersistenceError",
                4,
            ),
            (
                SenderError::UnreachableState {
                    gen_utime: 1,
                    expire_at: 2,
                },
                "UnreachableStateError",
                5,
            ),
            (SenderError::BrokenChain("x".into()), "BrokenChainError", 6),
            (
                SenderError::HistoryGap {
                    lt_before: 1,
                    pages: 3,
                },
                "HistoryGapError",
                7,
            ),
            (
                SenderError::NoEffect {
                    tx_hash: Hash256::default(),
                },
                "NoEffectError",
                8,
            ),
        ];

        for (err, kind, code) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.exit_code(), code);
            assert_ne!(err.exit_code(), 0);
        }
    }

    #[test]
    fn test_integrity_classification() {
        assert!(SenderError::BrokenChain("x".into()).is_integrity_violation());
        assert!(SenderError::AccountVanished.is_integrity_violation());
        assert!(!SenderError::Validation("x".into()).is_integrity_violation());
    }

    #[test]
    fn test_lower_layer_errors_become_validation() {
        let err: SenderError = MoneyError::Negative.into();
        assert_eq!(err.kind(), "ValidationError");

        let err: SenderError = MessageError::ZeroAmount.into();
        assert_eq!(err.to_string(), "Validation failed: Transfer amount must be greater than zero");
    }

    #[test]
    fn test_display() {
        let err = SenderError::InsufficientFunds {
            required: Amount::from(200_000_000),
            available: Amount::from(5),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 200000000, available 5"
        );
    }
}
