//! # Money Module
//!
//! Provides the `Money` type for every price, total and commission figure in
//! the ledger.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE PRORATION PROBLEM                                                  │
//! │                                                                         │
//! │  A row expected C$100.00 for 3 packages of 12 units; 7 units sold.     │
//! │    Float:   100.0 * 7 / 36 = 19.444444...   (drifts when summed)       │
//! │    Cents:   10000 * 7 / 36 = 1944.44 → 1944 cents (rounded half-up)    │
//! │                                                                         │
//! │  Every order rollup is a plain sum of row figures, so each row must    │
//! │  already be an exact number of cents.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dulce_core::money::Money;
//! use dulce_core::types::CommissionRate;
//!
//! let price = Money::from_cents(4500); // C$45.00 per package
//! let expected = price * 12;           // C$540.00
//! let vendor = expected.percentage(CommissionRate::from_percentage(10.0));
//! assert_eq!(vendor.cents(), 5400);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::CommissionRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents of the local currency.
///
/// Signed, because gross profit goes negative when a branch price sits below
/// the provider price. Arithmetic saturates at the `i64` bounds, so a corrupt
/// row yields a huge figure in a report rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns `None` for zero, `Some(self)` otherwise.
    ///
    /// Used by the fallback chains in [`crate::finance`], where the first
    /// non-zero candidate wins.
    #[inline]
    pub fn non_zero(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    /// Takes a percentage share of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use dulce_core::money::Money;
    /// use dulce_core::types::CommissionRate;
    ///
    /// let profit = Money::from_cents(1005);
    /// let share = profit.percentage(CommissionRate::from_bps(1000)); // 10%
    /// assert_eq!(share.cents(), 101); // 100.5 rounds up
    /// ```
    pub fn percentage(&self, rate: CommissionRate) -> Money {
        Money(round_div(self.0 as i128 * rate.bps() as i128, 10_000))
    }

    /// Scales this amount by `numerator / denominator`, rounded half away
    /// from zero. A zero or negative denominator yields zero.
    ///
    /// ## Example
    /// ```rust
    /// use dulce_core::money::Money;
    ///
    /// // 7 of 36 units sold out of a C$100.00 line
    /// let sold = Money::from_cents(10_000).prorate(7, 36);
    /// assert_eq!(sold.cents(), 1944);
    /// ```
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Money {
        if denominator <= 0 {
            return Money::zero();
        }
        Money(round_div(self.0 as i128 * numerator as i128, denominator as i128))
    }
}

/// Integer division rounding half away from zero. `den` must be positive.
fn round_div(num: i128, den: i128) -> i64 {
    let half = den / 2;
    let q = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    q.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display in córdobas; UI formatting lives with the consumer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}C${}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
