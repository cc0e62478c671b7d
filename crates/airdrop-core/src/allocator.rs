//! Interval allocation: the time-weighted split of the emission budget.
//!
//! Balances are piecewise constant between events, so the integral of
//! `balance * dt` is an exact sum over intervals of constant timestamp.
//! Each closed interval's budget (`elapsed * rate`) is split across every
//! tracked address in proportion to its balance at the moment of closing.
//!
//! Interval boundaries:
//! 1. Accrual starts at the first event whose block height reaches the
//!    window's start block ([`AllocatorPhase::Idle`] -> `Accruing`).
//! 2. While accruing, an interval closes whenever an event's timestamp
//!    differs from the current boundary, or at the last event of the stream.
//! 3. After the stream, one final interval runs from the last event's
//!    timestamp to the window end.

use std::collections::BTreeMap;

use num_rational::BigRational;
use num_traits::Zero;
use tracing::trace;

use crate::emission::EmissionSchedule;
use crate::error::AllocationError;
use crate::ledger::Ledger;
use crate::types::{Address, TransferEvent};

/// Running fractional reward per address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardAccumulator {
    rewards: BTreeMap<Address, BigRational>,
}

impl RewardAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the address's running reward, creating the entry if needed.
    pub fn credit(&mut self, address: Address, amount: BigRational) {
        *self
            .rewards
            .entry(address)
            .or_insert_with(BigRational::zero) += amount;
    }

    pub fn get(&self, address: &Address) -> Option<&BigRational> {
        self.rewards.get(address)
    }

    /// Entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &BigRational)> {
        self.rewards.iter()
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Exact sum of all accumulated rewards.
    pub fn total(&self) -> BigRational {
        self.rewards
            .values()
            .fold(BigRational::zero(), |acc, r| acc + r)
    }
}

/// A span of replay time `[start_timestamp, end_timestamp]` to be paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start_timestamp: u64,
    pub end_timestamp: u64,
}

impl Interval {
    /// Length in seconds. Fails if the interval runs backwards.
    pub fn elapsed(&self) -> Result<u64, AllocationError> {
        self.end_timestamp
            .checked_sub(self.start_timestamp)
            .ok_or(AllocationError::TimestampRegression {
                boundary: self.start_timestamp,
                timestamp: self.end_timestamp,
            })
    }
}

/// Record of one distributed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    pub interval: Interval,
    /// `elapsed * rate`, the amount split across holders.
    pub budget: BigRational,
}

/// Allocator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorPhase {
    /// Before the start block has been reached; no accrual.
    #[default]
    Idle,
    /// Accruing; `boundary_timestamp` opens the current interval.
    Accruing { boundary_timestamp: u64 },
}

impl AllocatorPhase {
    /// Evaluate the boundary check for `event`, which the ledger has already
    /// applied. Returns the next phase and the interval to close, if any.
    pub fn advance(
        self,
        event: &TransferEvent,
        start_block: u64,
        is_last: bool,
    ) -> (Self, Option<Interval>) {
        let boundary = match self {
            Self::Accruing { boundary_timestamp } => boundary_timestamp,
            Self::Idle if event.block_height >= start_block => event.timestamp,
            Self::Idle => return (Self::Idle, None),
        };

        if event.timestamp != boundary || is_last {
            let interval = Interval {
                start_timestamp: boundary,
                end_timestamp: event.timestamp,
            };
            (
                Self::Accruing {
                    boundary_timestamp: event.timestamp,
                },
                Some(interval),
            )
        } else {
            (
                Self::Accruing {
                    boundary_timestamp: boundary,
                },
                None,
            )
        }
    }

    pub fn is_accruing(&self) -> bool {
        matches!(self, Self::Accruing { .. })
    }
}

/// Split one interval's budget across every tracked address in proportion
/// to its current balance.
///
/// Runs even for a zero-length interval, in which case every tracked address
/// receives a zero entry. Fails if the current total supply is zero.
pub fn distribute(
    ledger: &Ledger,
    schedule: &EmissionSchedule,
    accumulator: &mut RewardAccumulator,
    interval: Interval,
) -> Result<IntervalReport, AllocationError> {
    let elapsed = interval.elapsed()?;
    let supply = ledger.total_supply();
    if supply.is_zero() {
        return Err(AllocationError::ZeroSupply {
            timestamp: interval.end_timestamp,
        });
    }

    let budget = schedule.interval_budget(elapsed);
    let per_unit = &budget / BigRational::from_integer(supply.clone());

    for (address, balance) in ledger.balances() {
        let share = &per_unit * BigRational::from_integer(balance.clone());
        accumulator.credit(*address, share);
    }

    trace!(
        start = interval.start_timestamp,
        end = interval.end_timestamp,
        elapsed,
        supply = %supply,
        holders = ledger.tracked_addresses(),
        "interval distributed"
    );

    Ok(IntervalReport { interval, budget })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::EmissionWindow;
    use crate::ledger::TransferSemantics;
    use num_bigint::{BigInt, BigUint};
    use proptest::prelude::*;

    fn addr(seed: u8) -> Address {
        Address([seed; 20])
    }

    fn mint(to: Address, amount: u64, height: u64, ts: u64) -> TransferEvent {
        TransferEvent {
            from: Address::ZERO,
            to,
            amount: BigUint::from(amount),
            block_height: height,
            timestamp: ts,
        }
    }

    fn schedule(start: u64, end: u64, amount: u64) -> EmissionSchedule {
        EmissionSchedule::new(
            EmissionWindow {
                start_block: 10,
                end_block: 20,
                start_timestamp: start,
                end_timestamp: end,
            },
            BigUint::from(amount),
        )
        .unwrap()
    }

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    // --- phase transitions ---

    #[test]
    fn idle_ignores_events_before_start_block() {
        let (phase, closed) = AllocatorPhase::Idle.advance(&mint(addr(1), 1, 9, 100), 10, false);
        assert_eq!(phase, AllocatorPhase::Idle);
        assert!(closed.is_none());
    }

    #[test]
    fn idle_ignores_last_event_before_start_block() {
        let (phase, closed) = AllocatorPhase::Idle.advance(&mint(addr(1), 1, 9, 100), 10, true);
        assert_eq!(phase, AllocatorPhase::Idle);
        assert!(closed.is_none());
    }

    #[test]
    fn first_event_at_start_block_begins_accrual() {
        let (phase, closed) = AllocatorPhase::Idle.advance(&mint(addr(1), 1, 10, 100), 10, false);
        assert_eq!(
            phase,
            AllocatorPhase::Accruing {
                boundary_timestamp: 100
            }
        );
        assert!(closed.is_none());
    }

    #[test]
    fn trigger_on_last_event_closes_empty_interval() {
        let (_, closed) = AllocatorPhase::Idle.advance(&mint(addr(1), 1, 12, 100), 10, true);
        let closed = closed.unwrap();
        assert_eq!(closed.elapsed().unwrap(), 0);
    }

    #[test]
    fn timestamp_change_closes_interval() {
        let phase = AllocatorPhase::Accruing {
            boundary_timestamp: 100,
        };
        let (next, closed) = phase.advance(&mint(addr(1), 1, 11, 130), 10, false);
        assert_eq!(
            next,
            AllocatorPhase::Accruing {
                boundary_timestamp: 130
            }
        );
        assert_eq!(
            closed,
            Some(Interval {
                start_timestamp: 100,
                end_timestamp: 130
            })
        );
    }

    #[test]
    fn same_timestamp_keeps_interval_open() {
        let phase = AllocatorPhase::Accruing {
            boundary_timestamp: 100,
        };
        let (next, closed) = phase.advance(&mint(addr(1), 1, 11, 100), 10, false);
        assert_eq!(next, phase);
        assert!(closed.is_none());
    }

    #[test]
    fn regression_interval_errors() {
        let interval = Interval {
            start_timestamp: 100,
            end_timestamp: 90,
        };
        assert_eq!(
            interval.elapsed().unwrap_err(),
            AllocationError::TimestampRegression {
                boundary: 100,
                timestamp: 90
            }
        );
    }

    // --- distribute ---

    #[test]
    fn distribute_splits_by_balance() {
        let mut ledger = Ledger::new(TransferSemantics::SenderOnly);
        ledger.apply(&mint(addr(1), 300, 10, 0));
        ledger.apply(&mint(addr(2), 100, 10, 0));
        let s = schedule(0, 100, 1000);
        let mut acc = RewardAccumulator::new();

        let report = distribute(
            &ledger,
            &s,
            &mut acc,
            Interval {
                start_timestamp: 0,
                end_timestamp: 40,
            },
        )
        .unwrap();

        assert_eq!(report.budget, rat(400));
        assert_eq!(acc.get(&addr(1)), Some(&rat(300)));
        assert_eq!(acc.get(&addr(2)), Some(&rat(100)));
        assert_eq!(acc.total(), rat(400));
    }

    #[test]
    fn distribute_zero_supply_fails() {
        let mut ledger = Ledger::new(TransferSemantics::SenderOnly);
        ledger.apply(&mint(addr(1), 10, 10, 0));
        ledger.apply(&TransferEvent {
            from: addr(1),
            to: Address::ZERO,
            amount: BigUint::from(10u32),
            block_height: 10,
            timestamp: 5,
        });
        let mut acc = RewardAccumulator::new();
        let err = distribute(
            &ledger,
            &schedule(0, 100, 1000),
            &mut acc,
            Interval {
                start_timestamp: 0,
                end_timestamp: 5,
            },
        )
        .unwrap_err();
        assert_eq!(err, AllocationError::ZeroSupply { timestamp: 5 });
        assert!(acc.is_empty());
    }

    #[test]
    fn zero_length_interval_records_zero_entries() {
        let mut ledger = Ledger::new(TransferSemantics::SenderOnly);
        ledger.apply(&mint(addr(1), 10, 10, 0));
        let mut acc = RewardAccumulator::new();
        distribute(
            &ledger,
            &schedule(0, 100, 1000),
            &mut acc,
            Interval {
                start_timestamp: 7,
                end_timestamp: 7,
            },
        )
        .unwrap();
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.get(&addr(1)), Some(&rat(0)));
    }

    #[test]
    fn fractional_shares_are_exact() {
        let mut ledger = Ledger::new(TransferSemantics::SenderOnly);
        ledger.apply(&mint(addr(1), 1, 10, 0));
        ledger.apply(&mint(addr(2), 2, 10, 0));
        let mut acc = RewardAccumulator::new();
        distribute(
            &ledger,
            &schedule(0, 100, 100),
            &mut acc,
            Interval {
                start_timestamp: 0,
                end_timestamp: 1,
            },
        )
        .unwrap();
        // budget = 1, split 1:2
        assert_eq!(
            acc.get(&addr(1)).unwrap(),
            &BigRational::new(BigInt::from(1), BigInt::from(3))
        );
        assert_eq!(
            acc.get(&addr(2)).unwrap(),
            &BigRational::new(BigInt::from(2), BigInt::from(3))
        );
        assert_eq!(acc.total(), rat(1));
    }

    proptest! {
        #[test]
        fn rewards_proportional_to_balances(
            a in 1u64..1_000_000_000,
            b in 1u64..1_000_000_000,
            elapsed in 1u64..100,
            amount in 1u64..u64::MAX,
        ) {
            let mut ledger = Ledger::new(TransferSemantics::Standard);
            ledger.apply(&mint(addr(1), a, 10, 0));
            ledger.apply(&mint(addr(2), b, 10, 0));
            let mut acc = RewardAccumulator::new();
            distribute(
                &ledger,
                &schedule(0, 100, amount),
                &mut acc,
                Interval { start_timestamp: 0, end_timestamp: elapsed },
            ).unwrap();
            let ra = acc.get(&addr(1)).unwrap();
            let rb = acc.get(&addr(2)).unwrap();
            prop_assert_eq!(
                ra / rb,
                BigRational::new(BigInt::from(a), BigInt::from(b))
            );
        }

        #[test]
        fn interval_budget_fully_distributed(
            balances in prop::collection::vec(1u64..1_000_000, 1..16),
            elapsed in 0u64..100,
            amount in 1u64..u64::MAX,
        ) {
            let mut ledger = Ledger::new(TransferSemantics::Standard);
            for (i, bal) in balances.iter().enumerate() {
                ledger.apply(&mint(addr(i as u8 + 1), *bal, 10, 0));
            }
            let mut acc = RewardAccumulator::new();
            let report = distribute(
                &ledger,
                &schedule(0, 100, amount),
                &mut acc,
                Interval { start_timestamp: 0, end_timestamp: elapsed },
            ).unwrap();
            prop_assert_eq!(acc.total(), report.budget);
        }
    }
}
