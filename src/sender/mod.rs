//! Reliable Transfer Sender
//!
//! Sends one value transfer from a wallet and determines its final outcome
//! from the ledger itself, across crashes and ambiguous send results.
//!
//! # Cycle
//!
//! ```text
//! build ─▶ persist SENDING ─▶ submit ─┬─ tx ────────────────┬─▶ resolve ─▶ persist SUCCESS/EXPIRE
//!                                     └─ none ─▶ scan history┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Send**: intent is durable before the message leaves
//! 2. **Idempotent Resend**: a restart resends the same persisted message
//! 3. **Verified History**: outcomes come only from fresh, contiguous history
//! 4. **At Most One Effect**: the message expires at a ledger time, after
//!    which the reconciliation answer is final

pub mod engine;
pub mod error;
pub mod resolver;
pub mod scanner;


pub use engine::{CycleOutcome, CyclePhase, SenderSettings, SubmissionEngine};
pub use error::SenderError;
pub use scanner::{ReconciliationScanner, ScanSettings};
