//! Run configuration: an optional file, `AIRDROP_*` environment variables,
//! then command line flags, each layer overriding the previous one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use airdrop_core::constants::DEFAULT_TOKEN_DECIMALS;
use airdrop_core::emission::scale_amount;
use airdrop_core::error::ConfigError;
use airdrop_core::{Address, TransferSemantics};
use airdrop_source::EthRpcConfig;
use anyhow::{Context, Result, bail};
use config::{Environment, File};
use num_bigint::BigUint;
use serde::Deserialize;

/// File read when `--config` is not given. Missing is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "airdrop.toml";

/// Prefix for environment overrides, e.g. `AIRDROP_START_BLOCK`.
pub const ENV_PREFIX: &str = "AIRDROP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AirdropConfig {
    /// ERC-20 contract whose holders are rewarded.
    pub token_address: Option<Address>,
    /// First block of the emission window.
    pub start_block: u64,
    /// Last block of the emission window; also the last block replayed.
    pub end_block: u64,
    /// Airdrop budget in whole tokens.
    pub airdrop_amount: u64,
    pub decimals: u32,
    pub transfer_semantics: TransferSemantics,
    /// JSON-RPC endpoint. Mutually exclusive with `snapshot`.
    pub rpc_url: Option<String>,
    /// Offline snapshot file. Mutually exclusive with `rpc_url`.
    pub snapshot: Option<PathBuf>,
    /// First block scanned for transfer logs (the token's deployment block).
    pub from_block: u64,
    pub log_chunk_size: Option<u64>,
    pub request_timeout_secs: u64,
    /// Reward list destination.
    pub output: PathBuf,
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for AirdropConfig {
    fn default() -> Self {
        Self {
            token_address: None,
            start_block: 0,
            end_block: 0,
            airdrop_amount: 0,
            decimals: DEFAULT_TOKEN_DECIMALS,
            transfer_semantics: TransferSemantics::default(),
            rpc_url: None,
            snapshot: None,
            from_block: 0,
            log_chunk_size: None,
            request_timeout_secs: 60,
            output: PathBuf::from("reward.json"),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

/// Where events come from.
#[derive(Debug, Clone)]
pub enum SourceKind {
    Rpc(EthRpcConfig),
    Snapshot(PathBuf),
}

impl AirdropConfig {
    /// Load from `path` (or [`DEFAULT_CONFIG_FILE`] if present) and the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("failed to read configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Checks shared by every command: a token, a non-empty block range and
    /// exactly one event source.
    pub fn validate_source(&self) -> Result<()> {
        if self.token_address.is_none() {
            bail!("token_address is required");
        }
        if self.end_block <= self.start_block {
            return Err(ConfigError::EmptyBlockRange {
                start: self.start_block,
                end: self.end_block,
            }
            .into());
        }
        match (&self.rpc_url, &self.snapshot) {
            (None, None) => bail!("one of rpc_url or snapshot is required"),
            (Some(_), Some(_)) => bail!("rpc_url and snapshot are mutually exclusive"),
            _ => {}
        }
        match self.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => bail!("log_format must be \"text\" or \"json\", got {other:?}"),
        }
    }

    /// Full validation for an allocation run.
    pub fn validate(&self) -> Result<()> {
        self.validate_source()?;
        if self.airdrop_amount == 0 {
            return Err(ConfigError::ZeroAmount.into());
        }
        Ok(())
    }

    pub fn token(&self) -> Result<Address> {
        self.token_address.context("token_address is required")
    }

    /// Airdrop budget in the token's smallest unit.
    pub fn scaled_amount(&self) -> BigUint {
        scale_amount(self.airdrop_amount, self.decimals)
    }

    pub fn source_kind(&self) -> Result<SourceKind> {
        match (&self.rpc_url, &self.snapshot) {
            (Some(url), None) => Ok(SourceKind::Rpc(EthRpcConfig {
                url: url.clone(),
                from_block: self.from_block,
                log_chunk_size: self.log_chunk_size,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                ..EthRpcConfig::default()
            })),
            (None, Some(path)) => Ok(SourceKind::Snapshot(path.clone())),
            _ => bail!("exactly one of rpc_url or snapshot must be set"),
        }
    }
}
