//! Core types used throughout the system
//!
//! Fundamental ledger primitives: logical time, ledger time, addresses and
//! 256-bit hashes. Everything that crosses a module boundary is expressed
//! in these types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical time - per-account, monotonically increasing transaction counter.
///
/// # Usage:
/// - Pagination marker when walking account history backward
/// - `lt_before` snapshot taken before the first send
pub type Lt = u64;

/// Ledger time in unix seconds (`gen_utime` of the latest shard block).
///
/// Authoritative for expiry. Never compared against the local clock.
pub type UnixTime = u32;

// ============================================================
// Hash256
// ============================================================

/// 256-bit hash (message digest or transaction hash), hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Hash256 {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(s.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// Address
// ============================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Missing workchain separator in {0:?}")]
    MissingSeparator(String),

    #[error("Invalid workchain id: {0}")]
    InvalidWorkchain(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected 64 hex chars, got {0}")]
    InvalidLength(usize),
}

/// Raw account address `workchain:account_id` (e.g. `0:f625…df74`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i8,
    pub account_id: [u8; 32],
}

impl Address {
    pub fn new(workchain: i8, account_id: [u8; 32]) -> Self {
        Self {
            workchain,
            account_id,
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (wc, id) = s
            .split_once(':')
            .ok_or_else(|| AddressError::MissingSeparator(s.to_string()))?;

        let workchain: i8 = wc
            .parse()
            .map_err(|_| AddressError::InvalidWorkchain(wc.to_string()))?;

        if id.len() != 64 {
            return Err(AddressError::InvalidLength(id.len()));
        }
        let account_id = Hash256::from_str(id)?.0;

        Ok(Self {
            workchain,
            account_id,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.account_id))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74";

    #[test]
    fn test_address_roundtrip() {
        let addr: Address = WALLET.parse().unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.to_string(), WALLET);
    }

    #[test]
    fn test_address_masterchain() {
        let raw = "-1:00ee4a5d98e8e9c4b5dd3e5bf31432e9e95bb53c1db85d45e101779f5420b000";
        let addr: Address = raw.parse().unwrap();
        assert_eq!(addr.workchain, -1);
    }

    #[test]
    fn test_address_malformed() {
        assert!(matches!(
            "f625baf2".parse::<Address>(),
            Err(AddressError::MissingSeparator(_))
        ));
        assert!(matches!(
            "0:abcd".parse::<Address>(),
            Err(AddressError::InvalidLength(4))
        ));
        assert!(matches!(
            "x:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74".parse::<Address>(),
            Err(AddressError::InvalidWorkchain(_))
        ));
        assert!(matches!(
            "0:zz25baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74".parse::<Address>(),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_hash_serde_hex() {
        let h = Hash256([0xab; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
