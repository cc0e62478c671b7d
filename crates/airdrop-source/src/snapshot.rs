//! Offline JSON snapshots of a token's transfer history.
//!
//! A snapshot holds the transfer logs and every block timestamp a run needs,
//! so the airdrop can be recomputed without network access:
//!
//! ```json
//! {
//!   "token": "0xe5859f4efc09027a9b718781dcb2c6910cac6e91",
//!   "blocks": [{ "height": 100, "hash": "0x..", "timestamp": 1600000000 }],
//!   "transfers": [{
//!     "from": "0x0000000000000000000000000000000000000000",
//!     "to": "0x..", "amount": "1000000000000000000",
//!     "block_height": 100, "log_index": 0
//!   }]
//! }
//! ```
//!
//! `amount` accepts a decimal string or a JSON integer. A block without a
//! `hash` gets a synthetic one derived from its height.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use airdrop_core::error::SourceError;
use airdrop_core::source::EventSource;
use airdrop_core::types::{Address, Hash256, TransferLog};
use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Token the transfers belong to. `None` accepts any requested token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    pub blocks: Vec<SnapshotBlock>,
    pub transfers: Vec<SnapshotTransfer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBlock {
    pub height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash256>,
    pub timestamp: u64,
}

impl SnapshotBlock {
    fn resolved_hash(&self) -> Hash256 {
        self.hash.unwrap_or_else(|| synthetic_hash(self.height))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTransfer {
    pub from: Address,
    pub to: Address,
    #[serde(with = "decimal_amount")]
    pub amount: BigUint,
    pub block_height: u64,
    #[serde(default)]
    pub log_index: u64,
}

/// Placeholder hash for blocks recorded without one: the height, big-endian,
/// in the low eight bytes.
fn synthetic_hash(height: u64) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    Hash256(bytes)
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let data = std::fs::read(path)
            .map_err(|e| SourceError::Io(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&data)
            .map_err(|e| SourceError::Decode(format!("snapshot {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), SourceError> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| SourceError::Decode(format!("encode snapshot: {e}")))?;
        std::fs::write(path, data)
            .map_err(|e| SourceError::Io(format!("write {}: {e}", path.display())))
    }
}

/// [`EventSource`] over an in-memory [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    token: Option<Address>,
    logs: Vec<TransferLog>,
    by_height: HashMap<u64, u64>,
    by_hash: HashMap<Hash256, u64>,
}

impl SnapshotSource {
    /// Index a snapshot. Transfers are ordered by `(block_height, log_index)`;
    /// every transfer's block must be present in `blocks`.
    pub fn new(snapshot: Snapshot) -> Result<Self, SourceError> {
        let mut by_height: HashMap<u64, u64> = HashMap::new();
        let mut hash_of: HashMap<u64, Hash256> = HashMap::new();
        let mut by_hash: HashMap<Hash256, u64> = HashMap::new();
        for block in &snapshot.blocks {
            if let Some(previous) = by_height.insert(block.height, block.timestamp) {
                if previous != block.timestamp {
                    return Err(SourceError::Decode(format!(
                        "block {} listed with timestamps {previous} and {}",
                        block.height, block.timestamp
                    )));
                }
            }
            let hash = block.resolved_hash();
            hash_of.insert(block.height, hash);
            by_hash.insert(hash, block.timestamp);
        }

        let mut transfers = snapshot.transfers;
        transfers.sort_by_key(|t| (t.block_height, t.log_index));
        let logs = transfers
            .into_iter()
            .map(|t| {
                let block_hash = *hash_of.get(&t.block_height).ok_or_else(|| {
                    SourceError::BlockNotFound(format!(
                        "{} (referenced by a transfer)",
                        t.block_height
                    ))
                })?;
                Ok(TransferLog {
                    from: t.from,
                    to: t.to,
                    amount: t.amount,
                    block_height: t.block_height,
                    block_hash,
                    log_index: t.log_index,
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Self {
            token: snapshot.token,
            logs,
            by_height,
            by_hash,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let source = Self::new(Snapshot::load(path)?)?;
        info!(
            path = %path.display(),
            transfers = source.logs.len(),
            blocks = source.by_height.len(),
            "loaded snapshot"
        );
        Ok(source)
    }
}

#[async_trait]
impl EventSource for SnapshotSource {
    async fn fetch_transfer_logs(
        &self,
        token: &Address,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, SourceError> {
        if let Some(own) = &self.token {
            if own != token {
                return Err(SourceError::Decode(format!(
                    "snapshot holds token {own}, requested {token}"
                )));
            }
        }
        Ok(self
            .logs
            .iter()
            .filter(|l| l.block_height <= to_block)
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64, SourceError> {
        self.by_height
            .get(&height)
            .copied()
            .ok_or_else(|| SourceError::BlockNotFound(height.to_string()))
    }

    async fn block_timestamp_by_hash(&self, hash: &Hash256) -> Result<u64, SourceError> {
        self.by_hash
            .get(hash)
            .copied()
            .ok_or_else(|| SourceError::BlockNotFound(hash.to_string()))
    }
}

/// Record everything a run over `[start_block, end_block]` needs from
/// `source` into a [`Snapshot`].
pub async fn capture<S: EventSource + ?Sized>(
    source: &S,
    token: &Address,
    start_block: u64,
    end_block: u64,
) -> Result<Snapshot, SourceError> {
    let logs = source.fetch_transfer_logs(token, end_block).await?;

    let mut blocks: BTreeMap<u64, SnapshotBlock> = BTreeMap::new();
    for log in &logs {
        if blocks.contains_key(&log.block_height) {
            continue;
        }
        let timestamp = source.block_timestamp_by_hash(&log.block_hash).await?;
        blocks.insert(
            log.block_height,
            SnapshotBlock {
                height: log.block_height,
                hash: Some(log.block_hash),
                timestamp,
            },
        );
    }
    for height in [start_block, end_block] {
        if !blocks.contains_key(&height) {
            let timestamp = source.block_timestamp(height).await?;
            blocks.insert(
                height,
                SnapshotBlock {
                    height,
                    hash: None,
                    timestamp,
                },
            );
        }
    }

    info!(
        transfers = logs.len(),
        blocks = blocks.len(),
        "captured snapshot"
    );

    Ok(Snapshot {
        token: Some(*token),
        blocks: blocks.into_values().collect(),
        transfers: logs
            .into_iter()
            .map(|l| SnapshotTransfer {
                from: l.from,
                to: l.to,
                amount: l.amount,
                block_height: l.block_height,
                log_index: l.log_index,
            })
            .collect(),
    })
}

/// Token amounts as decimal strings; integers are accepted on input.
mod decimal_amount {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s,
            other => {
                return Err(de::Error::custom(format!(
                    "amount must be a string or integer, got {other}"
                )));
            }
        };
        BigUint::from_str(text.trim()).map_err(de::Error::custom)
    }
}
