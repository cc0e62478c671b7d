//! Ethereum JSON-RPC event source.
//!
//! Uses three methods:
//! - `eth_getLogs` filtered by token address and the ERC-20 `Transfer` topic
//! - `eth_getBlockByNumber` for the window bounds
//! - `eth_getBlockByHash` for per-event timestamps

use std::time::Duration;

use airdrop_core::constants::ERC20_TRANSFER_TOPIC;
use airdrop_core::error::SourceError;
use airdrop_core::source::EventSource;
use airdrop_core::types::{Address, Hash256, TransferLog};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::quantity::{decode_amount, decode_quantity, encode_quantity};

/// Connection and query settings for [`EthRpcSource`].
#[derive(Debug, Clone)]
pub struct EthRpcConfig {
    /// HTTP(S) endpoint of the node or provider.
    pub url: String,
    /// First block scanned for logs (e.g. the token's deployment block).
    pub from_block: u64,
    /// Split `eth_getLogs` into ranges of at most this many blocks.
    /// `None` issues a single query.
    pub log_chunk_size: Option<u64>,
    pub request_timeout: Duration,
    /// Response size cap; log queries over a whole token history are large.
    pub max_response_size: u32,
}

impl Default for EthRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            from_block: 0,
            log_chunk_size: None,
            request_timeout: Duration::from_secs(60),
            max_response_size: 256 * 1024 * 1024,
        }
    }
}

/// Event source backed by an Ethereum JSON-RPC endpoint.
pub struct EthRpcSource {
    client: HttpClient,
    config: EthRpcConfig,
}

impl EthRpcSource {
    pub fn new(config: EthRpcConfig) -> Result<Self, SourceError> {
        let client = HttpClientBuilder::default()
            .request_timeout(config.request_timeout)
            .max_response_size(config.max_response_size)
            .build(&config.url)
            .map_err(|e| SourceError::Rpc(format!("connect {}: {e}", config.url)))?;
        Ok(Self { client, config })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> Result<T, SourceError> {
        self.client
            .request(method, params)
            .await
            .map_err(|e| SourceError::Rpc(format!("{method}: {e}")))
    }

    async fn get_logs(
        &self,
        token: &Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RpcLog>, SourceError> {
        let filter = json!({
            "address": token.to_string(),
            "fromBlock": encode_quantity(from_block),
            "toBlock": encode_quantity(to_block),
            "topics": [[ERC20_TRANSFER_TOPIC]],
        });
        let mut params = ArrayParams::new();
        params
            .insert(filter)
            .map_err(|e| SourceError::Rpc(e.to_string()))?;
        self.call("eth_getLogs", params).await
    }

    async fn block_timestamp_with<P: serde::Serialize + Send>(
        &self,
        method: &str,
        id: P,
        label: String,
    ) -> Result<u64, SourceError> {
        let mut params = ArrayParams::new();
        params
            .insert(id)
            .map_err(|e| SourceError::Rpc(e.to_string()))?;
        params
            .insert(false)
            .map_err(|e| SourceError::Rpc(e.to_string()))?;
        let block: Option<RpcBlock> = self.call(method, params).await?;
        let block = block.ok_or(SourceError::BlockNotFound(label))?;
        decode_quantity(&block.timestamp)
    }
}

#[async_trait]
impl EventSource for EthRpcSource {
    async fn fetch_transfer_logs(
        &self,
        token: &Address,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, SourceError> {
        let ranges = block_ranges(self.config.from_block, to_block, self.config.log_chunk_size);
        let mut logs = Vec::new();
        for (from, to) in ranges {
            let raw = self.get_logs(token, from, to).await?;
            debug!(from, to, logs = raw.len(), "eth_getLogs");
            for entry in raw {
                if let Some(log) = parse_log(entry)? {
                    logs.push(log);
                }
            }
        }
        Ok(logs)
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64, SourceError> {
        self.block_timestamp_with("eth_getBlockByNumber", encode_quantity(height), height.to_string())
            .await
    }

    async fn block_timestamp_by_hash(&self, hash: &Hash256) -> Result<u64, SourceError> {
        self.block_timestamp_with("eth_getBlockByHash", hash.to_string(), hash.to_string())
            .await
    }
}

/// A log object as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub block_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcBlock {
    timestamp: String,
}

/// Convert a raw log to a [`TransferLog`]. Logs flagged `removed` (dropped
/// by a reorg while the query ran) are skipped.
pub fn parse_log(raw: RpcLog) -> Result<Option<TransferLog>, SourceError> {
    if raw.removed {
        return Ok(None);
    }
    if raw.topics.len() < 3 {
        return Err(SourceError::MalformedLog(format!(
            "expected 3 topics, got {}",
            raw.topics.len()
        )));
    }
    let topic = |i: usize| -> Result<Hash256, SourceError> {
        raw.topics[i]
            .parse()
            .map_err(|e| SourceError::MalformedLog(format!("topic {i}: {e}")))
    };
    let from = Address::from_topic(topic(1)?.as_bytes());
    let to = Address::from_topic(topic(2)?.as_bytes());
    let amount = decode_amount(&raw.data)?;

    let block_height = raw
        .block_number
        .as_deref()
        .ok_or_else(|| SourceError::MalformedLog("pending log without blockNumber".into()))
        .and_then(decode_quantity)?;
    let block_hash = raw
        .block_hash
        .as_deref()
        .ok_or_else(|| SourceError::MalformedLog("pending log without blockHash".into()))?
        .parse::<Hash256>()
        .map_err(|e| SourceError::MalformedLog(format!("blockHash: {e}")))?;
    let log_index = raw.log_index.as_deref().map(decode_quantity).transpose()?.unwrap_or(0);

    Ok(Some(TransferLog {
        from,
        to,
        amount,
        block_height,
        block_hash,
        log_index,
    }))
}

/// Inclusive block ranges covering `[from, to]`, each at most `chunk` blocks.
pub fn block_ranges(from: u64, to: u64, chunk: Option<u64>) -> Vec<(u64, u64)> {
    if from > to {
        return Vec::new();
    }
    let chunk = match chunk {
        Some(c) if c > 0 => c,
        _ => return vec![(from, to)],
    };
    let mut ranges = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(chunk - 1).min(to);
        ranges.push((start, end));
        if end == to {
            break;
        }
        start = end + 1;
    }
    ranges
}
