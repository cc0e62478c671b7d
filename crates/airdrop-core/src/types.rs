//! Core data types: addresses, block hashes, transfer events, reward entries.
//!
//! Token amounts are unbounded integers ([`BigUint`] on the wire, [`BigInt`]
//! once they become balances or rewards) since 18-decimal token supplies
//! routinely exceed 64 bits.

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{ADDRESS_LEN, HASH_LEN};
use crate::error::HexError;

/// Decode a `0x`-prefixed (or bare) hex string into a fixed-size array.
fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| HexError::InvalidHex(format!("{s}: {e}")))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexError::InvalidLength { expected: N, got })
}

/// A 20-byte account address.
///
/// Displayed and serialized as lowercase `0x`-prefixed hex. Parsing accepts
/// either case, with or without the prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The zero address. Mints originate from it, burns are sent to it.
    pub const ZERO: Self = Self([0u8; ADDRESS_LEN]);

    /// Create an address from a byte array.
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Extract an address from a 32-byte indexed log topic (low 20 bytes).
    pub fn from_topic(topic: &[u8; HASH_LEN]) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&topic[HASH_LEN - ADDRESS_LEN..]);
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s.trim()).map(Self)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte hash: block hashes and log topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; HASH_LEN]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash256 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s.trim()).map(Self)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A token transfer log as delivered by an event source, before its block
/// timestamp has been resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferLog {
    pub from: Address,
    pub to: Address,
    /// Amount in the token's smallest unit.
    pub amount: BigUint,
    pub block_height: u64,
    /// Hash of the containing block, used to resolve the timestamp.
    pub block_hash: Hash256,
    /// Position of the log within its block.
    pub log_index: u64,
}

impl TransferLog {
    /// Attach the resolved block timestamp.
    pub fn with_timestamp(self, timestamp: u64) -> TransferEvent {
        TransferEvent {
            from: self.from,
            to: self.to,
            amount: self.amount,
            block_height: self.block_height,
            timestamp,
        }
    }
}

/// A transfer event ready for replay: the log plus its block timestamp
/// (Unix seconds).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub amount: BigUint,
    pub block_height: u64,
    pub timestamp: u64,
}

impl TransferEvent {
    /// A mint originates from the zero address.
    pub fn is_mint(&self) -> bool {
        self.from.is_zero()
    }

    /// A burn is sent to the zero address (and is not itself a mint).
    pub fn is_burn(&self) -> bool {
        self.to.is_zero() && !self.from.is_zero()
    }
}

/// One line of the final reward list: an address and its truncated reward
/// in the token's smallest unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub address: Address,
    #[serde(with = "integer_literal")]
    pub amount: BigInt,
}

/// (De)serialize a [`BigInt`] as a bare JSON integer of any magnitude.
///
/// Relies on serde_json's `arbitrary_precision` feature so the digits are
/// written verbatim instead of being coerced through `f64`.
mod integer_literal {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer, de, ser};
    use serde_json::Number;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        let number = Number::from_str(&value.to_string()).map_err(ser::Error::custom)?;
        serde::Serialize::serialize(&number, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let number = Number::deserialize(deserializer)?;
        BigInt::from_str(&number.to_string()).map_err(de::Error::custom)
    }
}
