//! Per-address balance ledger replayed from transfer events.
//!
//! The ledger is a pure state machine: no I/O, no validation. Balances are
//! signed so that an out-of-order or inconsistent stream can drive an address
//! negative without aborting the replay.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::types::{Address, TransferEvent};

/// How non-mint events move balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferSemantics {
    /// Two-way branch on the sender. A mint credits the recipient and the
    /// supply. Every other event (burn or ordinary transfer) debits the
    /// sender and the supply; the recipient of a transfer is never credited.
    ///
    /// This reproduces the reference airdrop output exactly.
    #[default]
    SenderOnly,
    /// Three-way branch: mints credit the recipient and the supply, burns
    /// debit the sender and the supply, transfers move the amount from the
    /// sender to the recipient and leave the supply unchanged.
    Standard,
}

impl fmt::Display for TransferSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SenderOnly => f.write_str("sender-only"),
            Self::Standard => f.write_str("standard"),
        }
    }
}

impl FromStr for TransferSemantics {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender-only" | "sender_only" => Ok(Self::SenderOnly),
            "standard" => Ok(Self::Standard),
            other => Err(format!(
                "unknown transfer semantics {other:?} (expected sender-only or standard)"
            )),
        }
    }
}

/// Live balances and total supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    semantics: TransferSemantics,
    balances: BTreeMap<Address, BigInt>,
    total_supply: BigInt,
}

impl Ledger {
    pub fn new(semantics: TransferSemantics) -> Self {
        Self {
            semantics,
            balances: BTreeMap::new(),
            total_supply: BigInt::zero(),
        }
    }

    pub fn semantics(&self) -> TransferSemantics {
        self.semantics
    }

    /// Apply one event. Events must be applied in stream order.
    pub fn apply(&mut self, event: &TransferEvent) {
        let amount = BigInt::from(event.amount.clone());
        match self.semantics {
            TransferSemantics::SenderOnly => {
                if event.is_mint() {
                    self.credit(event.to, &amount);
                    self.total_supply += &amount;
                } else {
                    self.debit(event.from, &amount);
                    self.total_supply -= &amount;
                }
            }
            TransferSemantics::Standard => {
                if event.is_mint() {
                    self.credit(event.to, &amount);
                    self.total_supply += &amount;
                } else if event.is_burn() {
                    self.debit(event.from, &amount);
                    self.total_supply -= &amount;
                } else {
                    self.debit(event.from, &amount);
                    self.credit(event.to, &amount);
                }
            }
        }
    }

    fn credit(&mut self, address: Address, amount: &BigInt) {
        *self.balances.entry(address).or_insert_with(BigInt::zero) += amount;
    }

    fn debit(&mut self, address: Address, amount: &BigInt) {
        *self.balances.entry(address).or_insert_with(BigInt::zero) -= amount;
    }

    /// Current balance, zero for untracked addresses.
    pub fn balance(&self, address: &Address) -> BigInt {
        self.balances.get(address).cloned().unwrap_or_default()
    }

    pub fn total_supply(&self) -> &BigInt {
        &self.total_supply
    }

    /// All tracked addresses with their balances, in ascending address order.
    /// Includes addresses whose balance has returned to zero.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &BigInt)> {
        self.balances.iter()
    }

    /// Number of addresses the ledger has ever touched.
    pub fn tracked_addresses(&self) -> usize {
        self.balances.len()
    }

    /// Number of addresses currently holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }

    /// Number of addresses whose balance has gone negative.
    pub fn negative_count(&self) -> usize {
        self.balances.values().filter(|b| b.is_negative()).count()
    }

    pub fn sum_of_balances(&self) -> BigInt {
        self.balances.values().sum()
    }
}
