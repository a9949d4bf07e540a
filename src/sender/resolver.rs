//! Outcome Resolver
//!
//! The only writer of terminal status. `sending → success` when the
//! resolving transaction moved funds out, `sending → expire` when nothing
//! consumed the message.

use chrono::Utc;
use tracing::{error, info};

use super::error::SenderError;
use crate::ledger::TransactionRecord;
use crate::store::{DurableStore, PendingTransfer, PendingTransferStore, TransferStatus};

/// Apply the reconciled outcome to the pending record and persist it.
///
/// On `NoEffect` the record is not touched and stays `sending`.
pub fn resolve<S: DurableStore>(
    store: &PendingTransferStore<S>,
    mut pending: PendingTransfer,
    resolving_tx: Option<&TransactionRecord>,
) -> Result<PendingTransfer, SenderError> {
    let (status, tx_hash) = match resolving_tx {
        Some(tx) if tx.out_messages.is_empty() => {
            error!(
                message_hash = %pending.message_hash(),
                tx_hash = %tx.id.hash,
                tx_lt = tx.id.lt,
                "Message consumed without outbound transfer"
            );
            return Err(SenderError::NoEffect { tx_hash: tx.id.hash });
        }
        Some(tx) => (TransferStatus::Success, Some(tx.id.hash)),
        None => (TransferStatus::Expire, None),
    };

    if !pending.status.can_transition_to(status) {
        return Err(SenderError::Validation(format!(
            "record is already {}, cannot become {}",
            pending.status, status
        )));
    }

    pending.status = status;
    pending.tx_hash = tx_hash;
    pending.updated_at = Utc::now();
    store.save(&pending)?;

    info!(
        message_hash = %pending.message_hash(),
        status = %status,
        tx_hash = ?tx_hash,
        "Transfer resolved"
    );
    Ok(pending)
}
