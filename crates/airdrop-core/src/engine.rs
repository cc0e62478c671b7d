//! The airdrop replay as a pure fold over transfer events.
//!
//! [`AirdropState::step`] consumes the state and one event and returns the
//! next state: the ledger applies the event first, then the allocator's
//! boundary check runs. [`run`] folds `step` over the stream, flushes the
//! final interval up to the window end, and ranks the result.

use tracing::{debug, info, warn};

use crate::allocator::{AllocatorPhase, Interval, IntervalReport, RewardAccumulator, distribute};
use crate::emission::EmissionSchedule;
use crate::error::{AirdropError, AllocationError};
use crate::ledger::{Ledger, TransferSemantics};
use crate::ranking::{AirdropSummary, rank};
use crate::types::{RewardEntry, TransferEvent};

/// Replay state threaded through the fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirdropState {
    pub ledger: Ledger,
    pub accumulator: RewardAccumulator,
    pub phase: AllocatorPhase,
    pub intervals: Vec<IntervalReport>,
    /// Timestamp of the most recently applied event.
    pub last_timestamp: Option<u64>,
}

impl AirdropState {
    pub fn new(semantics: TransferSemantics) -> Self {
        Self {
            ledger: Ledger::new(semantics),
            accumulator: RewardAccumulator::new(),
            phase: AllocatorPhase::Idle,
            intervals: Vec::new(),
            last_timestamp: None,
        }
    }

    /// Apply one event and close an interval if the boundary rule fires.
    pub fn step(
        mut self,
        event: &TransferEvent,
        schedule: &EmissionSchedule,
        is_last: bool,
    ) -> Result<Self, AllocationError> {
        self.ledger.apply(event);
        self.last_timestamp = Some(event.timestamp);

        let was_accruing = self.phase.is_accruing();
        let (phase, closed) = self
            .phase
            .advance(event, schedule.window().start_block, is_last);
        self.phase = phase;

        if !was_accruing && phase.is_accruing() {
            debug!(
                block_height = event.block_height,
                timestamp = event.timestamp,
                "accrual started"
            );
        }

        if let Some(interval) = closed {
            let report = distribute(&self.ledger, schedule, &mut self.accumulator, interval)?;
            self.intervals.push(report);
        }
        Ok(self)
    }

    /// Flush the final interval from the last event to the window end and
    /// assemble the ranked output.
    pub fn finish(mut self, schedule: &EmissionSchedule) -> Result<AirdropOutcome, AllocationError> {
        let last = self.last_timestamp.ok_or(AllocationError::NoEvents)?;
        if !self.phase.is_accruing() {
            warn!(
                start_block = schedule.window().start_block,
                "no event reached the start block; only the final interval accrues"
            );
        }

        let flush = Interval {
            start_timestamp: last,
            end_timestamp: schedule.window().end_timestamp,
        };
        let report = distribute(&self.ledger, schedule, &mut self.accumulator, flush)?;
        self.intervals.push(report);

        let rewards = rank(&self.accumulator);
        let summary = AirdropSummary::new(&self.ledger, &self.accumulator, &rewards, schedule);
        info!(
            intervals = self.intervals.len(),
            recipients = summary.recipient_count,
            holders = summary.holder_count,
            "allocation complete"
        );

        Ok(AirdropOutcome {
            rewards,
            summary,
            intervals: self.intervals,
            ledger: self.ledger,
        })
    }
}

/// Result of a complete replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirdropOutcome {
    /// Reward list, descending by amount.
    pub rewards: Vec<RewardEntry>,
    pub summary: AirdropSummary,
    /// Every distributed interval in order, the final flush last.
    pub intervals: Vec<IntervalReport>,
    /// Ledger state after the last event.
    pub ledger: Ledger,
}

/// Replay `events` against `schedule` and produce the ranked rewards.
///
/// Events must be in non-decreasing block height / timestamp order.
pub fn run(
    events: &[TransferEvent],
    schedule: &EmissionSchedule,
    semantics: TransferSemantics,
) -> Result<AirdropOutcome, AirdropError> {
    if events.is_empty() {
        return Err(AllocationError::NoEvents.into());
    }
    let last_index = events.len() - 1;

    debug!(
        events = events.len(),
        rate = %schedule.rate(),
        ?semantics,
        "replaying transfer events"
    );

    let state = events
        .iter()
        .enumerate()
        .try_fold(AirdropState::new(semantics), |state, (index, event)| {
            state.step(event, schedule, index == last_index)
        })?;

    Ok(state.finish(schedule)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::EmissionWindow;
    use crate::types::Address;
    use num_bigint::{BigInt, BigUint};
    use num_rational::BigRational;

    fn addr(seed: u8) -> Address {
        Address([seed; 20])
    }

    fn transfer(from: Address, to: Address, amount: u64, height: u64, ts: u64) -> TransferEvent {
        TransferEvent {
            from,
            to,
            amount: BigUint::from(amount),
            block_height: height,
            timestamp: ts,
        }
    }

    fn schedule(start_block: u64, start: u64, end: u64, amount: u64) -> EmissionSchedule {
        EmissionSchedule::new(
            EmissionWindow {
                start_block,
                end_block: start_block + 100,
                start_timestamp: start,
                end_timestamp: end,
            },
            BigUint::from(amount),
        )
        .unwrap()
    }

    fn amount_of(outcome: &AirdropOutcome, a: Address) -> Option<BigInt> {
        outcome
            .rewards
            .iter()
            .find(|r| r.address == a)
            .map(|r| r.amount.clone())
    }

    #[test]
    fn single_holder_receives_whole_budget() {
        // A minted 100 at the start block and time 0; window [0, 100], budget 1000.
        let events = vec![transfer(Address::ZERO, addr(0xA), 100, 10, 0)];
        let outcome = run(&events, &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap();

        assert_eq!(outcome.rewards.len(), 1);
        assert_eq!(outcome.rewards[0].address, addr(0xA));
        assert_eq!(outcome.rewards[0].amount, BigInt::from(1000));
        assert_eq!(amount_of(&outcome, addr(0xB)), None);
        // The trigger event is also the last event: one empty interval plus the flush.
        assert_eq!(outcome.intervals.len(), 2);
        assert_eq!(outcome.intervals[0].interval.elapsed().unwrap(), 0);
        assert_eq!(outcome.intervals[1].interval.elapsed().unwrap(), 100);
    }

    #[test]
    fn balance_weighted_over_time() {
        // A holds 100 for [0, 50); B is minted 100 at t=50; window ends at 100.
        let events = vec![
            transfer(Address::ZERO, addr(1), 100, 10, 0),
            transfer(Address::ZERO, addr(2), 100, 11, 50),
        ];
        let outcome = run(&events, &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap();

        // [0,50] closes after B's mint: supply 200, budget 500 -> A 250, B 250.
        // flush [50,100]: budget 500 -> A 250, B 250.
        assert_eq!(amount_of(&outcome, addr(1)), Some(BigInt::from(500)));
        assert_eq!(amount_of(&outcome, addr(2)), Some(BigInt::from(500)));
    }

    #[test]
    fn balance_at_close_drives_the_split() {
        // Mint to A at t=0, mint to B at t=10 (interval [0,10] closes with both).
        let events = vec![
            transfer(Address::ZERO, addr(1), 300, 10, 0),
            transfer(Address::ZERO, addr(2), 100, 10, 10),
            transfer(Address::ZERO, addr(1), 0, 10, 20),
        ];
        let outcome = run(&events, &schedule(10, 0, 20, 2000), TransferSemantics::Standard).unwrap();
        // rate = 100/s. [0,10] -> 1000 split 3:1; [10,20] -> 1000 split 3:1; flush 0.
        assert_eq!(amount_of(&outcome, addr(1)), Some(BigInt::from(1500)));
        assert_eq!(amount_of(&outcome, addr(2)), Some(BigInt::from(500)));
    }

    #[test]
    fn events_before_start_block_only_build_balances() {
        let events = vec![
            transfer(Address::ZERO, addr(1), 100, 1, 0),
            transfer(Address::ZERO, addr(2), 100, 2, 40),
            transfer(Address::ZERO, addr(3), 200, 10, 60),
            transfer(Address::ZERO, addr(3), 0, 11, 80),
        ];
        let outcome = run(&events, &schedule(10, 50, 100, 500), TransferSemantics::SenderOnly).unwrap();
        // Accrual starts at t=60 (first event at block >= 10); time before is never paid.
        // rate 10/s; [60,80] -> 200, flush [80,100] -> 200. Supply 400 throughout.
        assert_eq!(amount_of(&outcome, addr(1)), Some(BigInt::from(100)));
        assert_eq!(amount_of(&outcome, addr(2)), Some(BigInt::from(100)));
        assert_eq!(amount_of(&outcome, addr(3)), Some(BigInt::from(200)));
        assert_eq!(
            outcome.summary.distributed_total,
            BigRational::from_integer(BigInt::from(400))
        );
    }

    #[test]
    fn sender_only_transfer_shrinks_supply() {
        let events = vec![
            transfer(Address::ZERO, addr(1), 100, 10, 0),
            transfer(Address::ZERO, addr(2), 100, 10, 0),
            transfer(addr(1), addr(2), 50, 10, 0),
        ];
        let sender_only = run(&events, &schedule(10, 0, 100, 1500), TransferSemantics::SenderOnly).unwrap();
        // Supply 150: A 50, B 100 -> rewards 500 / 1000.
        assert_eq!(amount_of(&sender_only, addr(1)), Some(BigInt::from(500)));
        assert_eq!(amount_of(&sender_only, addr(2)), Some(BigInt::from(1000)));

        let standard = run(&events, &schedule(10, 0, 100, 1500), TransferSemantics::Standard).unwrap();
        // Supply 200: A 50, B 150 -> rewards 375 / 1125.
        assert_eq!(amount_of(&standard, addr(1)), Some(BigInt::from(375)));
        assert_eq!(amount_of(&standard, addr(2)), Some(BigInt::from(1125)));
    }

    #[test]
    fn empty_stream_fails() {
        let err = run(&[], &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap_err();
        assert!(matches!(err, AirdropError::Allocation(AllocationError::NoEvents)));
    }

    #[test]
    fn zero_supply_at_boundary_fails() {
        let events = vec![
            transfer(Address::ZERO, addr(1), 100, 10, 0),
            transfer(addr(1), Address::ZERO, 100, 10, 5),
        ];
        let err = run(&events, &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap_err();
        assert!(matches!(
            err,
            AirdropError::Allocation(AllocationError::ZeroSupply { timestamp: 5 })
        ));
    }

    #[test]
    fn timestamp_regression_fails() {
        let events = vec![
            transfer(Address::ZERO, addr(1), 100, 10, 50),
            transfer(Address::ZERO, addr(1), 100, 11, 40),
        ];
        let err = run(&events, &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap_err();
        assert!(matches!(
            err,
            AirdropError::Allocation(AllocationError::TimestampRegression {
                boundary: 50,
                timestamp: 40
            })
        ));
    }

    #[test]
    fn last_event_after_window_end_fails() {
        let events = vec![transfer(Address::ZERO, addr(1), 100, 10, 150)];
        let err = run(&events, &schedule(10, 0, 100, 1000), TransferSemantics::SenderOnly).unwrap_err();
        assert!(matches!(
            err,
            AirdropError::Allocation(AllocationError::TimestampRegression { .. })
        ));
    }

    #[test]
    fn step_is_a_pure_transition() {
        let s = schedule(10, 0, 100, 1000);
        let event = transfer(Address::ZERO, addr(1), 100, 10, 0);
        let a = AirdropState::new(TransferSemantics::SenderOnly)
            .step(&event, &s, false)
            .unwrap();
        let b = AirdropState::new(TransferSemantics::SenderOnly)
            .step(&event, &s, false)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.phase,
            AllocatorPhase::Accruing {
                boundary_timestamp: 0
            }
        );
        assert!(a.intervals.is_empty());
    }

    #[test]
    fn budget_conservation_across_intervals() {
        let events = vec![
            transfer(Address::ZERO, addr(1), 7, 10, 3),
            transfer(Address::ZERO, addr(2), 11, 10, 9),
            transfer(Address::ZERO, addr(3), 13, 12, 9),
            transfer(addr(1), addr(2), 2, 13, 27),
        ];
        let s = schedule(10, 0, 97, 1_000_003);
        let outcome = run(&events, &s, TransferSemantics::Standard).unwrap();
        let first = outcome.intervals.first().unwrap().interval.start_timestamp;
        let last = outcome.intervals.last().unwrap().interval.end_timestamp;
        let budget_sum = outcome
            .intervals
            .iter()
            .fold(BigRational::from_integer(BigInt::from(0)), |acc, r| acc + &r.budget);
        assert_eq!(budget_sum, s.interval_budget(last - first));
        assert_eq!(outcome.summary.distributed_total, budget_sum);
    }
}
