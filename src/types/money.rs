//! Minor-unit money type
//!
//! All monetary values in the ledger are whole numbers of minor currency units
//! (cents). Arithmetic is checked: every operation that could overflow returns
//! `None` instead of wrapping, and callers turn that into a `LedgerError`.
//!
//! Decimal strings are only accepted at the system boundary (CSV files, CLI
//! arguments) through [`Money::from_major_str`], which goes through
//! `rust_decimal` so no floating-point value ever touches an amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of minor units in one major unit
const MINOR_PER_MAJOR: i64 = 100;

/// An amount of money in minor units (cents)
///
/// Balances are never negative; signed values only appear as deltas on
/// ledger transactions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero minor units
    pub const ZERO: Money = Money(0);

    /// Create an amount from minor units
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// The amount in minor units
    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add two amounts, returning `None` on overflow
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtract `other` from this amount, returning `None` on overflow
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Negate the amount, returning `None` for `i64::MIN`
    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Absolute value, returning `None` for `i64::MIN`
    pub fn checked_abs(self) -> Option<Money> {
        self.0.checked_abs().map(Money)
    }

    /// Sum a sequence of amounts, returning `None` if any partial sum overflows
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Parse a decimal major-unit string (e.g. `"1,234.50"`) into minor units
    ///
    /// Thousands separators are ignored. More than two fractional digits is
    /// rejected rather than rounded, since silently dropping a fraction of a
    /// cent would change the amount.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem if the string is blank, is not
    /// a decimal number, has more than two fractional digits, or does not fit
    /// in an `i64` number of minor units.
    pub fn from_major_str(input: &str) -> Result<Money, String> {
        let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Err("amount is empty".to_string());
        }

        let decimal = Decimal::from_str(&cleaned)
            .map_err(|_| format!("'{}' is not a decimal amount", input.trim()))?;

        if decimal.normalize().scale() > 2 {
            return Err(format!(
                "'{}' has more than two decimal places",
                input.trim()
            ));
        }

        decimal
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.to_i64())
            .map(Money)
            .ok_or_else(|| format!("'{}' is out of range", input.trim()))
    }
}

impl fmt::Display for Money {
    /// Formats as a major-unit decimal with two places, e.g. `-12.05`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / per_major, abs % per_major)
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_major_str(s)
    }
}
