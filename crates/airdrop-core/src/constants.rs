//! Protocol and reporting constants.

/// `keccak256("Transfer(address,address,uint256)")`, topic 0 of every ERC-20
/// transfer log.
pub const ERC20_TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Decimals assumed when scaling a whole-token airdrop amount to base units.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Emit a progress line every this many resolved event timestamps.
pub const PROGRESS_LOG_INTERVAL: usize = 100;

/// Fractional digits shown for the realized distribution total.
pub const SUMMARY_DECIMAL_PLACES: usize = 6;

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a block hash or log topic in bytes.
pub const HASH_LEN: usize = 32;
