//! Submission Engine
//!
//! Drives one transfer cycle:
//!
//! ```text
//! NoPendingTransfer ──load──▶ Created ──persist──▶ Sending ──▶ Resolved
//!        │                                           ▲
//!        └──────────── record is SENDING (resume) ───┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Send**: the SENDING record is saved before
//!    `submit_message`. A failed save aborts with nothing sent.
//! 2. **Same Message On Resume**: a resumed cycle resends the persisted
//!    bytes, so the digest (the idempotency key) never changes.
//! 3. **Ledger Decides**: a `None` from the send path is always reconciled
//!    against history before any status is written.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::SenderError;
use super::resolver;
use super::scanner::{ReconciliationScanner, ScanSettings};
use crate::core_types::{Address, Hash256};
use crate::ledger::{AccountStatus, LedgerClient, TransactionRecord};
use crate::message::{MessageBuilder, TransferParams};
use crate::money::Amount;
use crate::signer::Signer;
use crate::store::{DurableStore, PendingTransfer, PendingTransferStore, TransferStatus};

/// Per-cycle phase, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    NoPendingTransfer,
    Created,
    Sending,
    Resolved(TransferStatus),
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::NoPendingTransfer => write!(f, "no_pending_transfer"),
            CyclePhase::Created => write!(f, "created"),
            CyclePhase::Sending => write!(f, "sending"),
            CyclePhase::Resolved(status) => write!(f, "resolved({})", status),
        }
    }
}

/// What the engine sends and how it reconciles.
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub wallet: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub bounce: bool,
    pub flags: u8,
    pub payload: Option<Vec<u8>>,
    /// Attached only while the wallet is undeployed
    pub state_init: Option<Vec<u8>>,
    pub timeout_secs: u32,
    pub network_id: Option<i32>,
    /// Balance that must remain after the transfer
    pub min_reserve: Amount,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub status: TransferStatus,
    pub message_hash: Hash256,
    pub tx_hash: Option<Hash256>,
    /// The cycle picked up a SENDING record left by an earlier run
    pub resumed: bool,
}

pub struct SubmissionEngine<S> {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    store: PendingTransferStore<S>,
    builder: MessageBuilder,
    scanner: ReconciliationScanner,
    settings: SenderSettings,
}

impl<S: DurableStore> SubmissionEngine<S> {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        store: S,
        settings: SenderSettings,
    ) -> Self {
        let scanner = ReconciliationScanner::new(ledger.clone(), settings.scan);
        Self {
            ledger,
            signer,
            store: PendingTransferStore::new(store),
            builder: MessageBuilder::new(),
            scanner,
            settings,
        }
    }

    /// Replace the message builder (e.g. a fixed clock in tests)
    pub fn with_builder(mut self, builder: MessageBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn settings(&self) -> &SenderSettings {
        &self.settings
    }

    pub fn store(&self) -> &PendingTransferStore<S> {
        &self.store
    }

    /// Currently persisted record, if any
    pub fn pending(&self) -> Result<Option<PendingTransfer>, SenderError> {
        Ok(self.store.load()?)
    }

    /// Run one cycle to a terminal status.
    ///
    /// On any error the persisted SENDING record is left intact; the next
    /// call resumes it.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SenderError> {
        log_phase(CyclePhase::NoPendingTransfer, None);

        let (pending, resumed) = match self.store.load()? {
            Some(existing) if existing.status == TransferStatus::Sending => {
                self.check_resumable(&existing)?;
                info!(
                    message_hash = %existing.message_hash(),
                    lt_before = existing.lt_before,
                    expire_at = existing.signed_message.expire_at,
                    "Resuming unresolved transfer"
                );
                (existing, true)
            }
            previous => {
                if let Some(prev) = previous {
                    debug!(
                        message_hash = %prev.message_hash(),
                        status = %prev.status,
                        "Previous transfer is terminal"
                    );
                }
                (self.create().await?, false)
            }
        };

        log_phase(CyclePhase::Sending, Some(pending.message_hash()));
        let resolving_tx = self.send(&pending).await?;

        let message_hash = *pending.message_hash();
        let resolved = resolver::resolve(&self.store, pending, resolving_tx.as_ref())?;
        log_phase(CyclePhase::Resolved(resolved.status), Some(&message_hash));

        Ok(CycleOutcome {
            status: resolved.status,
            message_hash,
            tx_hash: resolved.tx_hash,
            resumed,
        })
    }

    /// Gate on fresh account state, build, sign and persist a new transfer.
    async fn create(&self) -> Result<PendingTransfer, SenderError> {
        let s = &self.settings;
        let state = self.ledger.get_account_state(&s.wallet).await?;

        let required = &s.amount + &s.min_reserve;
        let Some(state) = state else {
            return Err(SenderError::InsufficientFunds {
                required,
                available: Amount::zero(),
            });
        };

        let state_init = match state.status {
            AccountStatus::Frozen => {
                return Err(SenderError::Validation(format!(
                    "wallet {} is frozen",
                    s.wallet
                )));
            }
            AccountStatus::Uninit => match &s.state_init {
                Some(init) => Some(init.clone()),
                None => {
                    return Err(SenderError::Validation(format!(
                        "wallet {} is not deployed and no state_init is configured",
                        s.wallet
                    )));
                }
            },
            AccountStatus::Active => None,
        };

        if state.balance < required {
            warn!(
                balance = %state.balance,
                required = %required,
                "Balance below amount plus reserve"
            );
            return Err(SenderError::InsufficientFunds {
                required,
                available: state.balance,
            });
        }

        let lt_before = state.last_transaction_id.lt;
        let params = TransferParams {
            src: s.wallet,
            dest: s.recipient,
            amount: s.amount.clone(),
            bounce: s.bounce,
            flags: s.flags,
            payload: s.payload.clone(),
            state_init,
            timeout_secs: s.timeout_secs,
            public_key: self.signer.public_key(),
        };
        let unsigned = self.builder.prepare(&params)?;
        let signed = unsigned.sign(self.signer.as_ref(), s.network_id)?;

        let pending = PendingTransfer::new(signed, lt_before);
        self.store.save(&pending)?;

        log_phase(CyclePhase::Created, Some(pending.message_hash()));
        info!(
            message_hash = %pending.message_hash(),
            lt_before,
            expire_at = pending.signed_message.expire_at,
            value = %pending.signed_message.value,
            dest = %pending.signed_message.dest,
            "Transfer persisted"
        );
        Ok(pending)
    }

    /// Send the persisted message, reconciling when the send path is silent.
    async fn send(
        &self,
        pending: &PendingTransfer,
    ) -> Result<Option<TransactionRecord>, SenderError> {
        let message = &pending.signed_message;
        match self.ledger.submit_message(&message.src, message).await? {
            Some(tx) => {
                debug!(message_hash = %message.hash, tx_lt = tx.id.lt, "Send path returned transaction");
                Ok(Some(tx))
            }
            None => {
                info!(
                    message_hash = %message.hash,
                    lt_before = pending.lt_before,
                    "No transaction from send path, reconciling"
                );
                self.scanner
                    .find_resolving_transaction(&message.src, message, pending.lt_before)
                    .await
            }
        }
    }

    /// A resumed record must belong to this wallet, network and key, and be intact.
    fn check_resumable(&self, pending: &PendingTransfer) -> Result<(), SenderError> {
        let message = &pending.signed_message;
        if message.src != self.settings.wallet {
            return Err(SenderError::Validation(format!(
                "pending transfer was built for wallet {}, configured wallet is {}",
                message.src, self.settings.wallet
            )));
        }
        if message.network_id != self.settings.network_id {
            return Err(SenderError::Validation(format!(
                "pending transfer was signed for network id {:?}, configured network id is {:?}",
                message.network_id, self.settings.network_id
            )));
        }
        message.verify(&self.signer.public_key())?;
        Ok(())
    }
}

fn log_phase(phase: CyclePhase, message_hash: Option<&Hash256>) {
    match message_hash {
        Some(hash) => info!(phase = %phase, message_hash = %hash, "Cycle phase"),
        None => info!(phase = %phase, "Cycle phase"),
    }
}
