//! Money Module
//!
//! Arbitrary precision amounts in the ledger's smallest unit (nano).
//! All conversions between strings and amounts MUST go through this module.
//!
//! ## Design Principles
//! 1. No floating point anywhere: balances are `BigUint`, not `f64`/`u64`
//! 2. Explicit Error Handling: no silent truncation
//! 3. Decimal strings on the wire: JSON numbers are rejected for amounts
//!
//! ## Usage
//! ```rust
//! use ledger_sender::money::{parse_units, format_amount, NATIVE_DECIMALS};
//!
//! // Config carries smallest units; logs show native tokens
//! let nano = parse_units("100000000").unwrap();
//! assert_eq!(format_amount(&nano, NATIVE_DECIMALS), "0.1");
//! ```

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Decimal places of the native token (1 token = 10^9 nano).
pub const NATIVE_DECIMALS: u32 = 9;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount must be an integer number of smallest units: {0}")]
    NonIntegral(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Amount
// ============================================================================

/// Amount in smallest units. Serialized as a decimal string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Big-endian magnitude bytes (canonical encoding for hashing).
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Amount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_units(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Strings only: a JSON number may already have gone through f64.
        let s = String::deserialize(deserializer)?;
        parse_units(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Parse: String → Amount
// ============================================================================

/// Parse an integer count of smallest units (e.g. `"100000000"`).
///
/// Zero is accepted here (reserves may be zero); callers that need a
/// positive amount check `is_zero` themselves.
///
/// # Errors
/// * `Negative` - leading `-`
/// * `NonIntegral` - decimal point or exponent
/// * `InvalidFormat` - empty, sign `+`, or any non-digit
pub fn parse_units(amount_str: &str) -> Result<Amount, MoneyError> {
    let s = amount_str.trim();
    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if s.starts_with('-') {
        return Err(MoneyError::Negative);
    }
    if s.contains(['.', 'e', 'E']) {
        return Err(MoneyError::NonIntegral(s.to_string()));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!("invalid character in {}", s)));
    }

    BigUint::parse_bytes(s.as_bytes(), 10)
        .map(Amount)
        .ok_or_else(|| MoneyError::InvalidFormat(s.to_string()))
}

// ============================================================================
// Format: Amount → String
// ============================================================================

/// Render smallest units as a token amount, trailing zeros trimmed.
pub fn format_amount(value: &Amount, decimals: u32) -> String {
    let digits = value.0.to_string();
    if decimals == 0 {
        return digits;
    }

    let d = decimals as usize;
    let padded = format!("{:0>width$}", digits, width = d + 1);
    let (whole, frac) = padded.split_at(padded.len() - d);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
