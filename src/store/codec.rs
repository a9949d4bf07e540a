//! Versioned envelope for the pending record.
//!
//! ```json
//! { "format_version": 1, "checksum": "<crc64 hex>", "payload": "<record json>" }
//! ```
//!
//! The checksum covers the payload string exactly as written, so a torn or
//! hand-edited file is detected on load.

use serde::{Deserialize, Serialize};

use super::{PendingTransfer, StoreError};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    checksum: String,
    payload: String,
}

pub fn encode(transfer: &PendingTransfer) -> Result<Vec<u8>, StoreError> {
    let payload = serde_json::to_string(transfer)
        .map_err(|e| StoreError::Corrupt(format!("serialize record: {}", e)))?;
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        checksum: calculate_crc64(payload.as_bytes()),
        payload,
    };
    serde_json::to_vec_pretty(&envelope)
        .map_err(|e| StoreError::Corrupt(format!("serialize envelope: {}", e)))
}

pub fn decode(bytes: &[u8]) -> Result<PendingTransfer, StoreError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Corrupt(format!("envelope: {}", e)))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion(envelope.format_version));
    }

    let calculated = calculate_crc64(envelope.payload.as_bytes());
    if calculated != envelope.checksum {
        return Err(StoreError::Corrupt(format!(
            "Checksum mismatch: expected {}, got {}",
            envelope.checksum, calculated
        )));
    }

    serde_json::from_str(&envelope.payload)
        .map_err(|e| StoreError::Corrupt(format!("record: {}", e)))
}

fn calculate_crc64(data: &[u8]) -> String {
    use crc::{CRC_64_ECMA_182, Crc};

    const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);
    format!("{:016x}", CRC64.checksum(data))
}
