//! Reconciliation Scanner
//!
//! Reconstructs whether a sent message landed when the live send path gave
//! no answer. The ledger is the only source of truth, so every answer is
//! derived from a fresh account state and a contiguous slice of history
//! from the current head back to `lt_before`.
//!
//! # Checks
//! 1. **Freshness**: the node's ledger time must be past `expire_at`, so the
//!    message can no longer land after we look.
//! 2. **Coverage**: history must reach back to `lt_before` within the page
//!    ceiling.
//! 3. **Contiguity**: each record's `prev_transaction_id` points at the next
//!    older record, starting at the account head.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::SenderError;
use crate::core_types::{Address, Lt};
use crate::ledger::{AccountState, LedgerClient, TransactionRecord};
use crate::message::SignedMessage;

pub const DEFAULT_PAGE_SIZE: u8 = 10;
pub const DEFAULT_MAX_HISTORY_PAGES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub page_size: u8,
    pub max_history_pages: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_history_pages: DEFAULT_MAX_HISTORY_PAGES,
        }
    }
}

pub struct ReconciliationScanner {
    ledger: Arc<dyn LedgerClient>,
    settings: ScanSettings,
}

impl ReconciliationScanner {
    pub fn new(ledger: Arc<dyn LedgerClient>, settings: ScanSettings) -> Self {
        Self { ledger, settings }
    }

    /// Find the transaction that consumed `message`, if any.
    ///
    /// `Ok(None)` means the message expired without inclusion.
    pub async fn find_resolving_transaction(
        &self,
        address: &Address,
        message: &SignedMessage,
        lt_before: Lt,
    ) -> Result<Option<TransactionRecord>, SenderError> {
        let head = self
            .ledger
            .get_account_state(address)
            .await?
            .ok_or(SenderError::AccountVanished)?;

        if head.gen_utime < message.expire_at {
            warn!(
                gen_utime = head.gen_utime,
                expire_at = message.expire_at,
                "Node state is older than message expiry"
            );
            return Err(SenderError::UnreachableState {
                gen_utime: head.gen_utime,
                expire_at: message.expire_at,
            });
        }

        if head.last_transaction_id.lt == lt_before {
            info!(lt_before, message_hash = %message.hash, "Account unchanged since send");
            return Ok(None);
        }

        let history = self.collect_history(address, &head, lt_before).await?;
        validate_chain(&head, &history)?;

        let found = history
            .into_iter()
            .filter(|tx| tx.id.lt > lt_before)
            .find(|tx| tx.in_message_hash() == Some(&message.hash));

        match &found {
            Some(tx) => info!(
                message_hash = %message.hash,
                tx_lt = tx.id.lt,
                tx_hash = %tx.id.hash,
                "Message found in history"
            ),
            None => info!(message_hash = %message.hash, lt_before, "Message not in history"),
        }
        Ok(found)
    }

    /// Page backward from the head until the record at `lt_before`.
    ///
    /// Returns newest first; the `lt_before` record is kept as the boundary
    /// and anything older is dropped.
    async fn collect_history(
        &self,
        address: &Address,
        head: &AccountState,
        lt_before: Lt,
    ) -> Result<Vec<TransactionRecord>, SenderError> {
        let mut records: Vec<TransactionRecord> = Vec::new();
        let mut continuation = Some(head.last_transaction_id);
        let mut pages = 0usize;

        loop {
            let Some(cursor) = continuation else {
                // Whole history is newer than a never-used account
                if lt_before == 0 {
                    return Ok(records);
                }
                return Err(SenderError::HistoryGap { lt_before, pages });
            };
            if pages >= self.settings.max_history_pages {
                warn!(lt_before, pages, "History page ceiling reached");
                return Err(SenderError::HistoryGap { lt_before, pages });
            }

            let batch = self
                .ledger
                .get_transactions(address, self.settings.page_size, Some(cursor))
                .await?;
            pages += 1;
            debug!(
                page = pages,
                cursor_lt = cursor.lt,
                count = batch.transactions.len(),
                "History page"
            );

            // Keeps `records` within page_size * max_history_pages
            if batch.transactions.len() > self.settings.page_size as usize {
                return Err(SenderError::BrokenChain(format!(
                    "page at lt {} has {} records, requested at most {}",
                    cursor.lt,
                    batch.transactions.len(),
                    self.settings.page_size
                )));
            }

            for tx in batch.transactions {
                if tx.id.lt < lt_before {
                    return Err(SenderError::BrokenChain(format!(
                        "history jumped from lt {} to {} past lt_before {}",
                        records.last().map(|r| r.id.lt).unwrap_or(cursor.lt),
                        tx.id.lt,
                        lt_before
                    )));
                }
                let reached = tx.id.lt == lt_before;
                records.push(tx);
                if reached {
                    return Ok(records);
                }
            }

            continuation = batch.continuation;
        }
    }
}

/// Freshness and contiguity of a newest-first history slice.
pub fn validate_chain(
    head: &AccountState,
    history: &[TransactionRecord],
) -> Result<(), SenderError> {
    let first = history
        .first()
        .ok_or_else(|| SenderError::BrokenChain("empty history for a changed account".into()))?;

    if first.id.lt != head.last_transaction_id.lt {
        return Err(SenderError::BrokenChain(format!(
            "history starts at lt {}, account head is lt {}",
            first.id.lt, head.last_transaction_id.lt
        )));
    }

    for pair in history.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        match newer.prev_transaction_id {
            Some(prev) if prev.lt == older.id.lt => {}
            Some(prev) => {
                return Err(SenderError::BrokenChain(format!(
                    "tx {} points to prev lt {}, next record is lt {}",
                    newer.id.lt, prev.lt, older.id.lt
                )));
            }
            None => {
                return Err(SenderError::BrokenChain(format!(
                    "tx {} has no previous transaction but is not the oldest",
                    newer.id.lt
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionsBatch;
    use crate::ledger::mock::{
        CallLog, MockLedger, account_state, chained_history, test_hash, transaction, tx_id,
    };

    #[test]
    fn test_validate_accepts_contiguous() {
        let head = account_state(0, 1000, 0);
        validate_chain(&head, &chained_history(1000, 500, None)).unwrap();
    }

    #[test]
    fn test_validate_rejects_stale_first_record() {
        let head = account_state(0, 1100, 0);
        let err = validate_chain(&head, &chained_history(1000, 500, None)).unwrap_err();
        assert!(matches!(err, SenderError::BrokenChain(_)));
    }

    #[test]
    fn test_validate_rejects_gap() {
        let head = account_state(0, 1000, 0);
        let mut history = chained_history(1000, 500, None);
        history.remove(2);
        let err = validate_chain(&head, &history).unwrap_err();
        assert!(matches!(err, SenderError::BrokenChain(msg) if msg.contains("prev lt 800")));
    }

    #[test]
    fn test_validate_rejects_missing_prev_mid_chain() {
        let head = account_state(0, 300, 0);
        let history = vec![
            transaction(300, Some(200), None, 1),
            transaction(200, None, None, 1),
            transaction(100, None, None, 1),
        ];
        assert!(matches!(
            validate_chain(&head, &history),
            Err(SenderError::BrokenChain(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let head = account_state(0, 300, 0);
        assert!(matches!(
            validate_chain(&head, &[]),
            Err(SenderError::BrokenChain(_))
        ));
    }

    #[tokio::test]
    async fn test_collect_stops_at_lt_before() {
        let log = CallLog::new();
        let ledger = MockLedger::new(log.clone()).with_history(chained_history(3000, 100, None));
        let scanner = ReconciliationScanner::new(Arc::new(ledger), ScanSettings::default());
        let head = account_state(0, 3000, 0);
        let addr = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74"
            .parse()
            .unwrap();

        let records = scanner.collect_history(&addr, &head, 1200).await.unwrap();
        assert_eq!(records.first().unwrap().id.lt, 3000);
        assert_eq!(records.last().unwrap().id.lt, 1200);
        assert_eq!(records.len(), 19);
        // Two pages of ten
        assert_eq!(log.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_rejects_oversized_page() {
        let log = CallLog::new();
        let oversized = TransactionsBatch {
            transactions: chained_history(1000, 100, None)[..5].to_vec(),
            continuation: Some(tx_id(500)),
        };
        let ledger = MockLedger::new(log.clone()).with_pages(vec![oversized]);
        let settings = ScanSettings {
            page_size: 4,
            max_history_pages: 5,
        };
        let scanner = ReconciliationScanner::new(Arc::new(ledger), settings);
        let head = account_state(0, 1000, 0);
        let addr = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74"
            .parse()
            .unwrap();

        let err = scanner.collect_history(&addr, &head, 200).await.unwrap_err();
        assert!(matches!(err, SenderError::BrokenChain(msg) if msg.contains("has 5 records")));
        assert_eq!(log.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_never_used_account() {
        let ledger = MockLedger::new(CallLog::new())
            .with_history(vec![transaction(100, None, Some(test_hash(9)), 1)]);
        let scanner = ReconciliationScanner::new(Arc::new(ledger), ScanSettings::default());
        let head = account_state(0, 100, 0);
        let addr = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74"
            .parse()
            .unwrap();

        let records = scanner.collect_history(&addr, &head, 0).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
