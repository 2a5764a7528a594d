//! Monetary types for ledgercore.
//!
//! All balances and transaction amounts are fixed-point decimals. Binary
//! floating point is never used for money: repeated transfers would
//! accumulate rounding drift that a ledger cannot tolerate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Decimal places carried by every monetary quantity.
pub const MONEY_SCALE: u32 = 2;

/// A single-currency monetary amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero amount.
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Create a new amount from a decimal value.
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    /// Parse from a string such as `"100.00"`.
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self(s.parse()?))
    }

    /// Get the underlying decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Round to the ledger's standard scale, banker's rounding.
    pub fn rounded(&self) -> Self {
        Self(self.0.round_dp(MONEY_SCALE))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, other: Amount) {
        self.0 += other.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, other: Amount) {
        self.0 -= other.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        Amount(iter.map(|a| a.0).sum())
    }
}
