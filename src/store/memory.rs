//! In-memory durable store for tests.
//!
//! Records each successful write into the shared [`CallLog`] and can be
//! switched to fail writes, to exercise the abort-before-send path.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{DurableStore, StoreError};
use crate::ledger::mock::{Call, CallLog};

pub struct MemoryStore {
    slot: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    log: Arc<CallLog>,
}

impl MemoryStore {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            slot: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
            log,
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw bytes currently stored
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Overwrite the slot directly (seeding a crashed run's leftovers)
    pub fn put_raw(&self, bytes: Vec<u8>) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes);
    }
}

impl DurableStore for MemoryStore {
    fn read_pending(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.snapshot())
    }

    fn write_pending(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("injected write failure")));
        }
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.to_vec());
        self.log.record(Call::WritePending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let log = CallLog::new();
        let store = MemoryStore::new(log.clone());
        assert!(store.read_pending().unwrap().is_none());

        store.write_pending(b"abc").unwrap();
        assert_eq!(store.read_pending().unwrap().unwrap(), b"abc");
        assert_eq!(log.calls(), vec![Call::WritePending]);
    }

    #[test]
    fn test_injected_failure_keeps_old_value() {
        let log = CallLog::new();
        let store = MemoryStore::new(log.clone());
        store.write_pending(b"old").unwrap();

        store.set_fail_writes(true);
        assert!(matches!(store.write_pending(b"new"), Err(StoreError::Io(_))));
        assert_eq!(store.snapshot().unwrap(), b"old");
        assert_eq!(log.calls().len(), 1);
    }
}
