//! Ranking and summary: rational rewards to the final integer reward list.

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use crate::allocator::RewardAccumulator;
use crate::emission::EmissionSchedule;
use crate::ledger::Ledger;
use crate::types::RewardEntry;

/// Truncate every accumulated reward to an integer and sort descending by
/// amount.
///
/// Truncation is toward zero (never rounded). The sort is stable over the
/// accumulator's ascending address order, so equal amounts are listed by
/// address.
pub fn rank(accumulator: &RewardAccumulator) -> Vec<RewardEntry> {
    let mut entries: Vec<RewardEntry> = accumulator
        .iter()
        .map(|(address, reward)| RewardEntry {
            address: *address,
            amount: reward.to_integer(),
        })
        .collect();
    entries.sort_by(|a, b| b.amount.cmp(&a.amount));
    entries
}

/// Counters reported alongside the reward list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirdropSummary {
    /// Total supply at the end of the replay.
    pub total_supply: BigInt,
    /// Addresses with a non-zero balance at the end of the replay.
    pub holder_count: usize,
    /// Addresses present in the reward list.
    pub recipient_count: usize,
    /// The configured budget, in the smallest unit.
    pub expected_total: BigUint,
    /// Exact sum of accumulated rewards before truncation.
    pub distributed_total: BigRational,
    /// Sum of the truncated reward list.
    pub distributed_truncated: BigInt,
}

impl AirdropSummary {
    pub fn new(
        ledger: &Ledger,
        accumulator: &RewardAccumulator,
        rewards: &[RewardEntry],
        schedule: &EmissionSchedule,
    ) -> Self {
        Self {
            total_supply: ledger.total_supply().clone(),
            holder_count: ledger.holder_count(),
            recipient_count: rewards.len(),
            expected_total: schedule.total_amount().clone(),
            distributed_total: accumulator.total(),
            distributed_truncated: rewards.iter().map(|r| &r.amount).sum(),
        }
    }

    /// The realized distribution as a fixed-point decimal string.
    pub fn distributed_decimal(&self, places: usize) -> String {
        format_decimal(&self.distributed_total, places)
    }

    /// Recipients whose truncated reward is non-zero.
    pub fn nonzero_recipients(rewards: &[RewardEntry]) -> usize {
        rewards.iter().filter(|r| !r.amount.is_zero()).count()
    }
}

/// Render a rational as a decimal with exactly `places` fractional digits,
/// truncating the remainder.
pub fn format_decimal(value: &BigRational, places: usize) -> String {
    let negative = value.is_negative();
    let abs = value.abs();
    let numer = abs.numer();
    let denom = abs.denom();
    let whole = numer / denom;
    if places == 0 {
        return format!("{}{whole}", if negative { "-" } else { "" });
    }
    let scale = num_traits::pow(BigInt::from(10), places);
    let frac = (numer % denom) * scale / denom;
    format!(
        "{}{whole}.{frac:0>places$}",
        if negative { "-" } else { "" }
    )
}
