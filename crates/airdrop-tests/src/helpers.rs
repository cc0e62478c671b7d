//! Shared test helpers for E2E and property tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use airdrop_core::error::SourceError;
use airdrop_core::{
    Address, AirdropError, AirdropOutcome, EmissionSchedule, EmissionWindow, EventSource, Hash256,
    TransferEvent, TransferLog, TransferSemantics, collect_events, resolve_window,
};
use airdrop_source::{Snapshot, SnapshotBlock, SnapshotSource, SnapshotTransfer};
use async_trait::async_trait;
use num_bigint::BigUint;

/// Token address used throughout the tests.
pub const TOKEN: Address = Address([0xe5; 20]);

/// Simple address from a seed byte. Seed 0 is the zero address.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

/// A timestamped transfer event, for driving the core directly.
pub fn event(from: Address, to: Address, amount: u64, block_height: u64, timestamp: u64) -> TransferEvent {
    TransferEvent {
        from,
        to,
        amount: BigUint::from(amount),
        block_height,
        timestamp,
    }
}

pub fn mint(to: Address, amount: u64, block_height: u64, timestamp: u64) -> TransferEvent {
    event(Address::ZERO, to, amount, block_height, timestamp)
}

/// Schedule over `[start_ts, end_ts]` paying `amount` base units.
pub fn schedule(start_block: u64, start_ts: u64, end_block: u64, end_ts: u64, amount: u64) -> EmissionSchedule {
    let window = EmissionWindow {
        start_block,
        end_block,
        start_timestamp: start_ts,
        end_timestamp: end_ts,
    };
    EmissionSchedule::new(window, BigUint::from(amount)).unwrap()
}

/// Builds a [`Snapshot`] block by block.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    token: Option<Address>,
    blocks: Vec<SnapshotBlock>,
    transfers: Vec<SnapshotTransfer>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            token: Some(TOKEN),
            ..Self::default()
        }
    }

    pub fn block(mut self, height: u64, timestamp: u64) -> Self {
        self.blocks.push(SnapshotBlock {
            height,
            hash: None,
            timestamp,
        });
        self
    }

    pub fn transfer(mut self, from: Address, to: Address, amount: u64, block_height: u64) -> Self {
        let log_index = self
            .transfers
            .iter()
            .filter(|t| t.block_height == block_height)
            .count() as u64;
        self.transfers.push(SnapshotTransfer {
            from,
            to,
            amount: BigUint::from(amount),
            block_height,
            log_index,
        });
        self
    }

    pub fn mint(self, to: Address, amount: u64, block_height: u64) -> Self {
        self.transfer(Address::ZERO, to, amount, block_height)
    }

    pub fn burn(self, from: Address, amount: u64, block_height: u64) -> Self {
        self.transfer(from, Address::ZERO, amount, block_height)
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            token: self.token,
            blocks: self.blocks,
            transfers: self.transfers,
        }
    }

    pub fn source(self) -> SnapshotSource {
        SnapshotSource::new(self.build()).unwrap()
    }
}

/// The binary's pipeline: resolve the window, build the schedule, collect
/// events and replay them. `amount` is in base units.
pub async fn run_pipeline<S: EventSource + ?Sized>(
    source: &S,
    token: &Address,
    start_block: u64,
    end_block: u64,
    amount: u64,
    semantics: TransferSemantics,
) -> Result<AirdropOutcome, AirdropError> {
    let window = resolve_window(source, start_block, end_block).await?;
    let schedule = EmissionSchedule::new(window, BigUint::from(amount))?;
    let events = collect_events(source, token, end_block).await?;
    airdrop_core::run(&events, &schedule, semantics)
}

/// Wraps a source and counts log fetches and per-hash timestamp lookups.
pub struct CountingSource<S> {
    inner: S,
    log_fetches: AtomicUsize,
    hash_lookups: AtomicUsize,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log_fetches: AtomicUsize::new(0),
            hash_lookups: AtomicUsize::new(0),
        }
    }

    pub fn log_fetches(&self) -> usize {
        self.log_fetches.load(Ordering::SeqCst)
    }

    pub fn hash_lookups(&self) -> usize {
        self.hash_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: EventSource> EventSource for CountingSource<S> {
    async fn fetch_transfer_logs(
        &self,
        token: &Address,
        to_block: u64,
    ) -> Result<Vec<TransferLog>, SourceError> {
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_transfer_logs(token, to_block).await
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64, SourceError> {
        self.inner.block_timestamp(height).await
    }

    async fn block_timestamp_by_hash(&self, hash: &Hash256) -> Result<u64, SourceError> {
        self.hash_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.block_timestamp_by_hash(hash).await
    }
}
