//! The event-source seam and the collection pipeline built on it.
//!
//! - [`EventSource`]: fetches transfer logs and resolves block timestamps
//!   (airdrop-source implements it over JSON-RPC and offline snapshots).
//! - [`resolve_window`]: turns the configured block range into timestamps.
//! - [`collect_events`]: fetches logs and attaches each event's timestamp.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::constants::PROGRESS_LOG_INTERVAL;
use crate::emission::EmissionWindow;
use crate::error::SourceError;
use crate::types::{Address, Hash256, TransferEvent, TransferLog};

/// Source of transfer logs and block timestamps for one chain.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// All transfer logs of `token` up to and including `to_block`, in
    /// ascending block height (and log index) order.
    async fn fetch_transfer_logs(
        &self,
        token: &Address,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, SourceError>;

    /// Timestamp (Unix seconds) of the block at `height`.
    async fn block_timestamp(&self, height: u64) -> Result<u64, SourceError>;

    /// Timestamp (Unix seconds) of the block with the given hash.
    async fn block_timestamp_by_hash(&self, hash: &Hash256) -> Result<u64, SourceError>;
}

/// Resolve the configured block range to its timestamps.
pub async fn resolve_window<S: EventSource + ?Sized>(
    source: &S,
    start_block: u64,
    end_block: u64,
) -> Result<EmissionWindow, SourceError> {
    let start_timestamp = source.block_timestamp(start_block).await?;
    let end_timestamp = source.block_timestamp(end_block).await?;
    debug!(
        start_block,
        end_block, start_timestamp, end_timestamp, "resolved emission window"
    );
    Ok(EmissionWindow {
        start_block,
        end_block,
        start_timestamp,
        end_timestamp,
    })
}

/// Fetch every transfer log of `token` up to `to_block` and resolve each
/// event's block timestamp.
///
/// Timestamps are cached per block hash, so a block holding many transfers
/// is requested once.
pub async fn collect_events<S: EventSource + ?Sized>(
    source: &S,
    token: &Address,
    to_block: u64,
) -> Result<Vec<TransferEvent>, SourceError> {
    let logs = source.fetch_transfer_logs(token, to_block).await?;
    let total = logs.len();
    info!(token = %token, to_block, events = total, "fetched transfer events");

    let mut cache: HashMap<Hash256, u64> = HashMap::new();
    let mut events = Vec::with_capacity(total);
    for (index, log) in logs.into_iter().enumerate() {
        let timestamp = match cache.get(&log.block_hash) {
            Some(ts) => *ts,
            None => {
                let ts = source.block_timestamp_by_hash(&log.block_hash).await?;
                cache.insert(log.block_hash, ts);
                ts
            }
        };
        if index % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                resolved = index,
                remaining = total - index,
                "resolving event timestamps"
            );
        }
        events.push(log.with_timestamp(timestamp));
    }

    info!(
        events = events.len(),
        blocks = cache.len(),
        "event timestamps resolved"
    );
    Ok(events)
}
