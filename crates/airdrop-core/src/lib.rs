//! # airdrop-core
//! Balance ledger and time-weighted reward allocation for retroactive airdrops.
//!
//! All reward arithmetic is exact: balances are [`BigInt`](num_bigint::BigInt)
//! and rewards accumulate as [`BigRational`](num_rational::BigRational). The
//! only rounding step is the truncation to whole units when the ranked
//! reward list is assembled.
//!
//! Pipeline:
//! - [`source`]: the [`EventSource`] seam and event/timestamp collection.
//! - [`ledger`]: replays mint/burn/transfer events into per-address balances.
//! - [`emission`]: the constant per-second emission rate for the window.
//! - [`allocator`]: closes intervals on timestamp changes and splits each
//!   interval's budget in proportion to current balances.
//! - [`engine`]: the pure fold tying the above together.
//! - [`ranking`]: truncation, ordering and summary counters.

pub mod allocator;
pub mod constants;
pub mod emission;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod ranking;
pub mod source;
pub mod types;

pub use allocator::{AllocatorPhase, Interval, IntervalReport, RewardAccumulator};
pub use emission::{EmissionSchedule, EmissionWindow};
pub use engine::{AirdropOutcome, AirdropState, run};
pub use error::AirdropError;
pub use ledger::{Ledger, TransferSemantics};
pub use ranking::{AirdropSummary, rank};
pub use source::{EventSource, collect_events, resolve_window};
pub use types::{Address, Hash256, RewardEntry, TransferEvent, TransferLog};
