//! Emission window and the constant per-second emission rate.
//!
//! `rate = total_amount / (end_timestamp - start_timestamp)`, held as an
//! exact rational so that interval budgets never accumulate rounding error.

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The block range of the airdrop and the timestamps it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionWindow {
    /// First block at which accrual may begin.
    pub start_block: u64,
    /// Last block included in the event query.
    pub end_block: u64,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
}

impl EmissionWindow {
    /// Window length in seconds, `None` if the window is empty or inverted.
    pub fn duration(&self) -> Option<u64> {
        self.end_timestamp
            .checked_sub(self.start_timestamp)
            .filter(|d| *d > 0)
    }
}

/// The resolved window together with the airdrop budget and its rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionSchedule {
    window: EmissionWindow,
    total_amount: BigUint,
    rate: BigRational,
}

impl EmissionSchedule {
    /// Derive the emission rate.
    ///
    /// `total_amount` must already be scaled to the token's smallest unit
    /// (see [`scale_amount`]). Fails if the window has no positive duration.
    pub fn new(window: EmissionWindow, total_amount: BigUint) -> Result<Self, ConfigError> {
        let duration = window.duration().ok_or(ConfigError::EmptyWindow {
            start: window.start_timestamp,
            end: window.end_timestamp,
        })?;
        let rate = BigRational::new(BigInt::from(total_amount.clone()), BigInt::from(duration));
        Ok(Self {
            window,
            total_amount,
            rate,
        })
    }

    pub fn window(&self) -> &EmissionWindow {
        &self.window
    }

    /// Tokens (smallest unit) emitted per second.
    pub fn rate(&self) -> &BigRational {
        &self.rate
    }

    pub fn total_amount(&self) -> &BigUint {
        &self.total_amount
    }

    /// Budget for an interval lasting `elapsed` seconds.
    pub fn interval_budget(&self, elapsed: u64) -> BigRational {
        &self.rate * BigRational::from_integer(BigInt::from(elapsed))
    }
}

/// Scale a whole-token amount to the smallest unit: `whole * 10^decimals`.
pub fn scale_amount(whole: u64, decimals: u32) -> BigUint {
    BigUint::from(whole) * num_traits::pow(BigUint::from(10u32), decimals as usize)
}
