//! ledger_sender - reliable single-transfer sender
//!
//! Sends one value transfer from a wallet to an account-based ledger and
//! determines its final outcome despite crashes and ambiguous send results.
//!
//! # Modules
//!
//! - [`core_types`] - Addresses, hashes, logical and ledger time
//! - [`money`] - Arbitrary-precision amounts
//! - [`message`] - Expiring, idempotent transfer messages
//! - [`signer`] - Ed25519 signer and keystore
//! - [`ledger`] - Ledger client trait, JSON-RPC client, mock
//! - [`store`] - Durable pending-transfer record
//! - [`sender`] - Submission engine, reconciliation scanner, outcome resolver
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing setup

// Core types - must be first!
pub mod core_types;
pub mod money;

pub mod message;
pub mod signer;

pub mod ledger;
pub mod store;

pub mod sender;

pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{Address, Hash256, Lt, UnixTime};
pub use ledger::{LedgerClient, LedgerError};
pub use message::{MessageBuilder, SignedMessage, TransferParams};
pub use money::Amount;
pub use sender::{CycleOutcome, SenderError, SenderSettings, SubmissionEngine};
pub use signer::{KeyPairSigner, Keystore, Signer};
pub use store::{DurableStore, FileStore, PendingTransfer, TransferStatus};
