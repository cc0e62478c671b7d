//! Ethereum JSON-RPC value encodings.
//!
//! Quantities are `0x`-prefixed hex without leading zeros (`"0x0"`, `"0x1b4"`).
//! Log `data` is unformatted big-endian bytes; an ERC-20 transfer carries a
//! single 32-byte `uint256`.

use airdrop_core::error::SourceError;
use num_bigint::BigUint;

/// Encode a block height as a JSON-RPC quantity.
pub fn encode_quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// Decode a JSON-RPC quantity into a `u64`.
pub fn decode_quantity(s: &str) -> Result<u64, SourceError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| SourceError::Decode(format!("quantity missing 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(SourceError::Decode(format!("empty quantity: {s}")));
    }
    u64::from_str_radix(digits, 16).map_err(|e| SourceError::Decode(format!("quantity {s}: {e}")))
}

/// Decode a log's `data` field as a big-endian unsigned integer. Empty data
/// (`"0x"`) decodes to zero.
pub fn decode_amount(data: &str) -> Result<BigUint, SourceError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(digits).map_err(|e| SourceError::Decode(format!("log data: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}
