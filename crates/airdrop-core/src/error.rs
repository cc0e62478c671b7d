//! Error types for the airdrop engine and its collaborators.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty emission window: end timestamp {end} <= start timestamp {start}")] EmptyWindow { start: u64, end: u64 },
    #[error("empty block range: end block {end} <= start block {start}")] EmptyBlockRange { start: u64, end: u64 },
    #[error("airdrop amount must be greater than zero")] ZeroAmount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("zero total supply at distribution boundary (timestamp {timestamp})")] ZeroSupply { timestamp: u64 },
    #[error("no transfer events to replay")] NoEvents,
    #[error("timestamp regression: {timestamp} precedes interval boundary {boundary}")] TimestampRegression { boundary: u64, timestamp: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("rpc: {0}")] Rpc(String),
    #[error("malformed log: {0}")] MalformedLog(String),
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("io: {0}")] Io(String),
    #[error("decode: {0}")] Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: expected {expected} bytes, got {got}")] InvalidLength { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum AirdropError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Allocation(#[from] AllocationError),
    #[error(transparent)] Source(#[from] SourceError),
    #[error(transparent)] Hex(#[from] HexError),
}
