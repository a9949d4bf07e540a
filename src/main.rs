//! ledger_sender - send one transfer and determine its outcome
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│  Ledger  │───▶│ Resolve  │
//! │  (YAML)  │    │(SENDING) │    │send/scan │    │(persist) │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Every run either resumes the persisted SENDING transfer or starts a new
//! one. Exit code 0 means the transfer reached a terminal status.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use ledger_sender::config::AppConfig;
use ledger_sender::ledger::JrpcLedgerClient;
use ledger_sender::money::{NATIVE_DECIMALS, format_amount};
use ledger_sender::signer::{KeyPairSigner, Keystore, Signer};
use ledger_sender::store::FileStore;
use ledger_sender::sender::{SenderError, SenderSettings, SubmissionEngine};

/// Exit code for bootstrap failures (config, keystore, client setup)
const EXIT_BOOTSTRAP: u8 = 1;

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|a| a == flag)
}

fn load_config() -> anyhow::Result<AppConfig> {
    match get_arg(&["--config", "-c"]) {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(&get_env()),
    }
}

#[derive(Serialize)]
struct GeneratedKey {
    public_key: String,
    secret_key: String,
}

fn keygen() -> anyhow::Result<()> {
    let signer = KeyPairSigner::generate();
    let key = GeneratedKey {
        public_key: hex::encode(signer.public_key()),
        secret_key: signer.secret_hex(),
    };
    println!("{}", serde_json::to_string_pretty(&key)?);
    Ok(())
}

fn main() -> ExitCode {
    if has_flag("--keygen") {
        return match keygen() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("BootstrapError: {:#}", e);
                ExitCode::from(EXIT_BOOTSTRAP)
            }
        };
    }

    let app_config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("BootstrapError: {:#}", e);
            return ExitCode::from(EXIT_BOOTSTRAP);
        }
    };
    let _log_guard = ledger_sender::logging::init_logging(&app_config.logging);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("BootstrapError: {}", e);
            return ExitCode::from(EXIT_BOOTSTRAP);
        }
    };

    runtime.block_on(run(app_config))
}

async fn run(app_config: AppConfig) -> ExitCode {
    let settings = match app_config.sender_settings() {
        Ok(settings) => settings,
        Err(e) => return report(&e),
    };

    let engine = match build_engine(&app_config, settings) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Bootstrap failed: {:#}", e);
            eprintln!("BootstrapError: {:#}", e);
            return ExitCode::from(EXIT_BOOTSTRAP);
        }
    };

    if has_flag("--status") {
        return match engine.pending() {
            Ok(Some(record)) => match serde_json::to_string_pretty(&record) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("BootstrapError: {}", e);
                    ExitCode::from(EXIT_BOOTSTRAP)
                }
            },
            Ok(None) => {
                println!("No pending transfer");
                ExitCode::SUCCESS
            }
            Err(e) => report(&e),
        };
    }

    tracing::info!(
        wallet = %engine.settings().wallet,
        recipient = %engine.settings().recipient,
        amount = %format_amount(&engine.settings().amount, NATIVE_DECIMALS),
        "Starting transfer cycle"
    );

    match engine.run_cycle().await {
        Ok(outcome) => {
            let tx_hash = outcome
                .tx_hash
                .map(|h| h.to_hex())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "status={} message_hash={} tx_hash={} resumed={}",
                outcome.status, outcome.message_hash, tx_hash, outcome.resumed
            );
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Error kind on stderr, per-kind exit code
fn report(e: &SenderError) -> ExitCode {
    tracing::error!(kind = e.kind(), "Run failed: {}", e);
    eprintln!("{}: {}", e.kind(), e);
    ExitCode::from(e.exit_code() as u8)
}

fn build_engine(
    app_config: &AppConfig,
    settings: SenderSettings,
) -> anyhow::Result<SubmissionEngine<FileStore>> {
    let public_key = app_config.public_key()?;

    let mut keystore = Keystore::load(&app_config.sender.keystore_path).with_context(|| {
        format!(
            "Failed to load keystore: {}",
            app_config.sender.keystore_path
        )
    })?;
    let signer = keystore.take_signer(&public_key)?;

    let ledger = JrpcLedgerClient::new(app_config.jrpc_config())?;
    let store = FileStore::new(&app_config.store.path);

    Ok(SubmissionEngine::new(
        Arc::new(ledger),
        Arc::new(signer),
        store,
        settings,
    ))
}
