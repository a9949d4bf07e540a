//! Scripted ledger for tests
//!
//! `MockLedger` serves account states and history from fixtures and writes
//! every call into a [`CallLog`] shared with `MemoryStore`, so tests can
//! assert ordering between store writes and ledger submits.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AccountState, AccountStatus, LedgerClient, LedgerError, MessageRef, OutMessage,
    TransactionId, TransactionRecord, TransactionsBatch,
};
use crate::core_types::{Address, Hash256, Lt, UnixTime};
use crate::message::SignedMessage;
use crate::money::Amount;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One observed side-effecting or read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WritePending,
    SubmitMessage(Hash256),
    GetAccountState,
    GetTransactions(Option<Lt>),
}

/// Ordered record of calls across test doubles
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Hashes passed to `submit_message`, in order
    pub fn submitted(&self) -> Vec<Hash256> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                Call::SubmitMessage(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        lock(&self.calls).iter().position(pred)
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

enum HistorySource {
    /// Full history, newest first; pages cut from it by cursor
    Records(Vec<TransactionRecord>),
    /// Fixed pages served in order regardless of cursor
    Pages(VecDeque<TransactionsBatch>),
}

pub struct MockLedger {
    log: Arc<CallLog>,
    /// States served in order; the last one sticks
    states: Mutex<VecDeque<Option<AccountState>>>,
    history: Mutex<HistorySource>,
    /// Results served in order; `None` once exhausted
    submit_results: Mutex<VecDeque<Option<TransactionRecord>>>,
}

impl MockLedger {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            states: Mutex::new(VecDeque::new()),
            history: Mutex::new(HistorySource::Records(Vec::new())),
            submit_results: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_states(self, states: Vec<Option<AccountState>>) -> Self {
        *lock(&self.states) = states.into();
        self
    }

    pub fn with_history(self, newest_first: Vec<TransactionRecord>) -> Self {
        *lock(&self.history) = HistorySource::Records(newest_first);
        self
    }

    pub fn with_pages(self, pages: Vec<TransactionsBatch>) -> Self {
        *lock(&self.history) = HistorySource::Pages(pages.into());
        self
    }

    pub fn with_submit_results(self, results: Vec<Option<TransactionRecord>>) -> Self {
        *lock(&self.submit_results) = results.into();
        self
    }

    /// Replace the state script between runs
    pub fn set_states(&self, states: Vec<Option<AccountState>>) {
        *lock(&self.states) = states.into();
    }

    pub fn set_submit_results(&self, results: Vec<Option<TransactionRecord>>) {
        *lock(&self.submit_results) = results.into();
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_message(
        &self,
        _dst: &Address,
        message: &SignedMessage,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        self.log.record(Call::SubmitMessage(message.hash));
        Ok(lock(&self.submit_results).pop_front().flatten())
    }

    async fn get_account_state(
        &self,
        _address: &Address,
    ) -> Result<Option<AccountState>, LedgerError> {
        self.log.record(Call::GetAccountState);
        let mut states = lock(&self.states);
        let state = if states.len() > 1 {
            states.pop_front().flatten()
        } else {
            states.front().cloned().flatten()
        };
        Ok(state)
    }

    async fn get_transactions(
        &self,
        _address: &Address,
        limit: u8,
        continuation: Option<TransactionId>,
    ) -> Result<TransactionsBatch, LedgerError> {
        self.log
            .record(Call::GetTransactions(continuation.map(|c| c.lt)));

        let mut history = lock(&self.history);
        match &mut *history {
            HistorySource::Pages(pages) => Ok(pages.pop_front().unwrap_or_default()),
            HistorySource::Records(records) => {
                let start = match continuation {
                    Some(cursor) => match records.iter().position(|r| r.id.lt == cursor.lt) {
                        Some(i) => i,
                        None => return Ok(TransactionsBatch::default()),
                    },
                    None => 0,
                };
                let end = (start + limit as usize).min(records.len());
                Ok(TransactionsBatch {
                    transactions: records[start..end].to_vec(),
                    continuation: records.get(end).map(|r| r.id),
                })
            }
        }
    }
}

// ============================================================
// Fixture helpers
// ============================================================

/// Deterministic hash for fixtures: every byte set to `seed`
pub fn test_hash(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

pub fn tx_id(lt: Lt) -> TransactionId {
    TransactionId {
        lt,
        hash: test_hash((lt % 251) as u8),
    }
}

pub fn account_state(balance: u64, last_lt: Lt, gen_utime: UnixTime) -> AccountState {
    AccountState {
        balance: Amount::from(balance),
        status: AccountStatus::Active,
        last_transaction_id: tx_id(last_lt),
        gen_utime,
    }
}

/// Transaction at `lt` chained to `prev_lt`, optionally consuming `in_hash`
pub fn transaction(
    lt: Lt,
    prev_lt: Option<Lt>,
    in_hash: Option<Hash256>,
    out_count: usize,
) -> TransactionRecord {
    TransactionRecord {
        id: tx_id(lt),
        prev_transaction_id: prev_lt.map(tx_id),
        in_message: in_hash.map(|hash| MessageRef { hash }),
        out_messages: (0..out_count)
            .map(|i| OutMessage {
                hash: test_hash(200u8.wrapping_add(i as u8)),
                dst: None,
                value: Amount::from(100_000_000),
            })
            .collect(),
    }
}

/// Contiguous history `from_lt` down to `to_lt` (step 100), newest first.
///
/// `inject` puts `(lt, in_hash, out_count)` on the matching record.
pub fn chained_history(
    from_lt: Lt,
    to_lt: Lt,
    inject: Option<(Lt, Hash256, usize)>,
) -> Vec<TransactionRecord> {
    let mut records = Vec::new();
    let mut lt = from_lt;
    loop {
        let prev = if lt > 100 { Some(lt - 100) } else { None };
        let record = match inject {
            Some((at, hash, outs)) if at == lt => transaction(lt, prev, Some(hash), outs),
            _ => transaction(lt, prev, Some(test_hash(((lt / 100) % 97) as u8 + 1)), 1),
        };
        records.push(record);
        if lt <= to_lt || lt <= 100 {
            break;
        }
        lt -= 100;
    }
    records
}
