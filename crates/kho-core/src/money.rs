//! # Money Module
//!
//! Provides the `Money` type for monetary values in Vietnamese đồng.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  VND has no minor unit in circulation.                                  │
//! │                                                                         │
//! │  Every price, line total and order total is a whole number of đồng,    │
//! │  stored as i64. Floating point never enters the pipeline:              │
//! │                                                                         │
//! │    unit price 12 500 ₫ × 3  = 37 500 ₫   (exact)                       │
//! │    Σ lines               = order.total_amount                           │
//! │    Σ order.total_amount  = report.totalRevenue                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in đồng.
///
/// Serializes as a bare integer so JSON bodies carry plain numbers
/// (`"total_amount": 37500`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from a whole number of đồng.
    ///
    /// ```rust
    /// use kho_core::money::Money;
    ///
    /// let price = Money::from_dong(12_500);
    /// assert_eq!(price.dong(), 12_500);
    /// ```
    #[inline]
    pub const fn from_dong(dong: i64) -> Self {
        Money(dong)
    }

    /// Returns the value in đồng.
    #[inline]
    pub const fn dong(&self) -> i64 {
        self.0
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// Saturates instead of overflowing; quantities are bounded by
    /// validation long before this matters.
    ///
    /// ```rust
    /// use kho_core::money::Money;
    ///
    /// let line = Money::from_dong(12_500).multiply_quantity(3);
    /// assert_eq!(line.dong(), 37_500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats with dot thousands separators, e.g. `1.250.000 ₫`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{} ₫", sign, grouped)
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
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
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
