use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places a currency amount may carry.
pub const CURRENCY_SCALE: u32 = 2;

/// Total number of digits a currency amount may carry, cents included.
pub const MAX_DIGITS: u32 = 12;

/// A non-negative currency amount with cent precision.
///
/// Wraps `rust_decimal::Decimal` so sums are exact; there is no floating-point
/// rounding anywhere between a payment amount and the order total it is
/// compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Validates and normalizes `value` to two decimal places.
    ///
    /// Negative values, values with sub-cent precision and values wider than
    /// [`MAX_DIGITS`] are rejected rather than rounded.
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} must not be negative"
            )));
        }
        if value.normalize().scale() > CURRENCY_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} has more than {CURRENCY_SCALE} decimal places"
            )));
        }
        if value >= Self::upper_bound() {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} has more than {MAX_DIGITS} digits"
            )));
        }
        let mut value = value;
        value.rescale(CURRENCY_SCALE);
        Ok(Self(value))
    }

    /// Smallest value that no longer fits in `MAX_DIGITS` digits.
    fn upper_bound() -> Decimal {
        Decimal::from(10_i64.pow(MAX_DIGITS - CURRENCY_SCALE))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Sums `amounts` without panicking. A sum is not bounded by
    /// `MAX_DIGITS`; it only fails if the underlying decimal overflows.
    pub fn try_sum<I>(amounts: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| {
                total.checked_add(amount).ok_or_else(|| {
                    LedgerError::InvalidAmount(format!("sum overflowed after {total}"))
                })
            })
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
