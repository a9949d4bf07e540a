use anyhow::{Context, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core_types::Address;
use crate::ledger::JrpcConfig;
use crate::message::{DEFAULT_SEND_FLAGS, MAX_TIMEOUT_SECS};
use crate::money;
use crate::sender::{ScanSettings, SenderError, SenderSettings};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(flatten)]
    pub logging: LogConfig,
    pub sender: SenderConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// `hourly | daily | never`
    pub rotation: String,
    pub enable_tracing: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "ledger_sender.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            enable_tracing: false,
        }
    }
}

/// What to send, from which wallet, signed by which key
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SenderConfig {
    pub wallet_address: String,
    /// Hex ed25519 public key; must be present in the keystore
    pub public_key: String,
    pub recipient: String,
    /// Integer amount in the smallest unit
    pub amount: String,
    #[serde(default)]
    pub bounce: bool,
    #[serde(default = "default_flags")]
    pub flags: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub network_id: Option<i32>,
    /// Smallest-unit balance that must remain after the transfer
    #[serde(default = "default_min_reserve")]
    pub min_reserve: String,
    /// Base64 payload attached to the transfer
    #[serde(default)]
    pub payload: Option<String>,
    /// Base64 wallet state-init, used while the wallet is undeployed
    #[serde(default)]
    pub state_init: Option<String>,
    pub keystore_path: String,
}

fn default_flags() -> u8 {
    DEFAULT_SEND_FLAGS
}

fn default_timeout_secs() -> u32 {
    60
}

fn default_min_reserve() -> String {
    "0".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub endpoint: String,
    /// HTTP request timeout in seconds
    pub request_timeout: u64,
    pub poll_interval_ms: u64,
    /// Polls without account state before submit gives up watching
    pub max_missing_polls: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let jrpc = JrpcConfig::default();
        Self {
            endpoint: jrpc.endpoint,
            request_timeout: jrpc.request_timeout.as_secs(),
            poll_interval_ms: jrpc.poll_interval.as_millis() as u64,
            max_missing_polls: jrpc.max_missing_polls,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Pending-transfer record file
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/pending_transfer.json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    pub page_size: u8,
    pub max_history_pages: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let scan = ScanSettings::default();
        Self {
            page_size: scan.page_size,
            max_history_pages: scan.max_history_pages,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> anyhow::Result<Self> {
        Self::load_from(format!("config/{}.yaml", env))
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan.page_size == 0 {
            bail!("scan.page_size must be positive");
        }
        if self.scan.max_history_pages == 0 {
            bail!("scan.max_history_pages must be positive");
        }
        if self.ledger.max_missing_polls == 0 {
            bail!("ledger.max_missing_polls must be positive");
        }
        if self.sender.timeout_secs == 0 || self.sender.timeout_secs > MAX_TIMEOUT_SECS {
            bail!(
                "sender.timeout_secs must be in 1..={}, got {}",
                MAX_TIMEOUT_SECS,
                self.sender.timeout_secs
            );
        }
        Ok(())
    }

    /// Typed engine settings from the string-typed config.
    ///
    /// Malformed addresses, amounts or base64 fields are `ValidationError`s,
    /// reported the same way as the engine's own input checks.
    pub fn sender_settings(&self) -> Result<SenderSettings, SenderError> {
        let s = &self.sender;
        let wallet: Address = s
            .wallet_address
            .parse()
            .map_err(|e| invalid("sender.wallet_address", e))?;
        let recipient: Address = s
            .recipient
            .parse()
            .map_err(|e| invalid("sender.recipient", e))?;

        Ok(SenderSettings {
            wallet,
            recipient,
            amount: money::parse_units(&s.amount).map_err(|e| invalid("sender.amount", e))?,
            bounce: s.bounce,
            flags: s.flags,
            payload: decode_base64(s.payload.as_deref(), "sender.payload")?,
            state_init: decode_base64(s.state_init.as_deref(), "sender.state_init")?,
            timeout_secs: s.timeout_secs,
            network_id: s.network_id,
            min_reserve: money::parse_units(&s.min_reserve)
                .map_err(|e| invalid("sender.min_reserve", e))?,
            scan: ScanSettings {
                page_size: self.scan.page_size,
                max_history_pages: self.scan.max_history_pages,
            },
        })
    }

    pub fn public_key(&self) -> anyhow::Result<[u8; 32]> {
        let bytes = hex::decode(&self.sender.public_key).context("sender.public_key")?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("sender.public_key: expected 32 bytes, got {}", b.len()))
    }

    pub fn jrpc_config(&self) -> JrpcConfig {
        JrpcConfig {
            endpoint: self.ledger.endpoint.clone(),
            request_timeout: Duration::from_secs(self.ledger.request_timeout),
            poll_interval: Duration::from_millis(self.ledger.poll_interval_ms),
            max_missing_polls: self.ledger.max_missing_polls,
            ..JrpcConfig::default()
        }
    }
}

fn invalid(field: &str, err: impl fmt::Display) -> SenderError {
    SenderError::Validation(format!("{}: {}", field, err))
}

fn decode_base64(value: Option<&str>, field: &str) -> Result<Option<Vec<u8>>, SenderError> {
    value
        .map(|v| BASE64.decode(v).map_err(|e| invalid(field, e)))
        .transpose()
}
