//! Crash-resume through the public API: a real `FileStore` on disk, the
//! scripted ledger, and a fresh engine per "process run".

use std::fs;
use std::sync::Arc;

use ledger_sender::ledger::mock::{
    CallLog, MockLedger, account_state, chained_history, transaction, tx_id,
};
use ledger_sender::message::DEFAULT_SEND_FLAGS;
use ledger_sender::sender::ScanSettings;
use ledger_sender::signer::{Keystore, Signer};
use ledger_sender::store::PendingTransferStore;
use ledger_sender::{
    Amount, FileStore, KeyPairSigner, SenderError, SenderSettings, SubmissionEngine,
    TransferStatus,
};

const WALLET: &str = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74";
const RECIPIENT: &str = "0:00ee4a5d98e8e9c4b5dd3e5bf31432e9e95bb53c1db85d45e101779f5420b000";

fn test_dir(name: &str) -> String {
    let dir = format!("target/test_file_store_resume_{}_{}", name, std::process::id());
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn settings() -> SenderSettings {
    SenderSettings {
        wallet: WALLET.parse().unwrap(),
        recipient: RECIPIENT.parse().unwrap(),
        amount: Amount::from(100_000_000),
        bounce: false,
        flags: DEFAULT_SEND_FLAGS,
        payload: None,
        state_init: None,
        timeout_secs: 60,
        network_id: None,
        min_reserve: Amount::zero(),
        scan: ScanSettings::default(),
    }
}

/// Keystore file in the on-disk format, holding one generated key
fn write_keystore(dir: &str) -> (String, [u8; 32]) {
    let signer = KeyPairSigner::generate();
    let public_key = signer.public_key();
    let path = format!("{}/keystore.json", dir);
    let body = serde_json::json!([{
        "public_key": hex::encode(public_key),
        "secret_key": signer.secret_hex(),
    }]);
    fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    (path, public_key)
}

#[tokio::test]
async fn test_resume_from_disk_after_undecided_run() {
    let dir = test_dir("undecided");
    let record_path = format!("{}/pending.json", dir);
    let (keystore_path, public_key) = write_keystore(&dir);

    // Run 1: node lags behind expiry, cycle cannot decide
    let log = CallLog::new();
    let ledger = Arc::new(MockLedger::new(log.clone()).with_states(vec![
        Some(account_state(1_000_000_000, 1200, 0)),
        Some(account_state(1_000_000_000, 1200, 0)),
    ]));
    let signer = Keystore::load(&keystore_path)
        .unwrap()
        .take_signer(&public_key)
        .unwrap();
    let engine = SubmissionEngine::new(
        ledger,
        Arc::new(signer),
        FileStore::new(&record_path),
        settings(),
    );
    let err = engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SenderError::UnreachableState { .. }));
    drop(engine);

    // The SENDING record survived on disk
    let on_disk = PendingTransferStore::new(FileStore::new(&record_path))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(on_disk.status, TransferStatus::Sending);
    assert_eq!(on_disk.lt_before, 1200);
    let hash = on_disk.signed_message.hash;

    // Run 2: new process, keys reloaded, ledger has moved past expiry
    let log = CallLog::new();
    let ledger = Arc::new(
        MockLedger::new(log.clone())
            .with_states(vec![Some(account_state(900_000_000, 1500, u32::MAX))])
            .with_history(chained_history(1500, 100, Some((1300, hash, 1)))),
    );
    let signer = Keystore::load(&keystore_path)
        .unwrap()
        .take_signer(&public_key)
        .unwrap();
    let engine = SubmissionEngine::new(
        ledger,
        Arc::new(signer),
        FileStore::new(&record_path),
        settings(),
    );

    let outcome = engine.run_cycle().await.unwrap();

    assert!(outcome.resumed);
    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.message_hash, hash);
    assert_eq!(outcome.tx_hash, Some(tx_id(1300).hash));
    assert_eq!(log.submitted(), vec![hash]);

    let resolved = engine.pending().unwrap().unwrap();
    assert_eq!(resolved.status, TransferStatus::Success);
    assert_eq!(resolved.signed_message, on_disk.signed_message);

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_direct_success_persists_terminal_record() {
    let dir = test_dir("direct");
    let record_path = format!("{}/pending.json", dir);
    let signer = Arc::new(KeyPairSigner::generate());

    let log = CallLog::new();
    let ledger = Arc::new(
        MockLedger::new(log.clone()).with_states(vec![Some(account_state(1_000_000_000, 1200, 0))]),
    );
    // Any inbound hash works here: the send path vouches for the transaction
    ledger.set_submit_results(vec![Some(transaction(1300, Some(1200), None, 1))]);

    let engine = SubmissionEngine::new(ledger, signer, FileStore::new(&record_path), settings());
    let outcome = engine.run_cycle().await.unwrap();
    assert_eq!(outcome.status, TransferStatus::Success);

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&record_path).unwrap()).unwrap();
    assert_eq!(raw["format_version"], 1);
    let record: serde_json::Value =
        serde_json::from_str(raw["payload"].as_str().unwrap()).unwrap();
    assert_eq!(record["status"], "success");
    assert_eq!(record["tx_hash"], tx_id(1300).hash.to_hex());

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_corrupt_record_is_persistence_error() {
    let dir = test_dir("corrupt");
    let record_path = format!("{}/pending.json", dir);
    fs::write(&record_path, b"{\"format_version\":1,\"checksum\":\"00\",\"payload\":\"{}\"}")
        .unwrap();

    let log = CallLog::new();
    let ledger = Arc::new(MockLedger::new(log.clone()));
    let engine = SubmissionEngine::new(
        ledger,
        Arc::new(KeyPairSigner::generate()),
        FileStore::new(&record_path),
        settings(),
    );

    let err = engine.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), "PersistenceError");
    assert!(log.calls().is_empty());

    let _ = fs::remove_dir_all(&dir);
}
