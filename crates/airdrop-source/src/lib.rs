//! # airdrop-source
//! Concrete [`EventSource`](airdrop_core::EventSource) implementations.
//!
//! - [`EthRpcSource`]: an Ethereum node or provider over HTTP JSON-RPC.
//! - [`SnapshotSource`]: an offline JSON snapshot, for reproducible reruns
//!   and tests. [`capture`] writes one from any other source.

pub mod quantity;
pub mod rpc;
pub mod snapshot;

pub use rpc::{EthRpcConfig, EthRpcSource};
pub use snapshot::{Snapshot, SnapshotBlock, SnapshotSource, SnapshotTransfer, capture};
