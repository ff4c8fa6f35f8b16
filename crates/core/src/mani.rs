//! Mani - fixed-point currency with a minimum increment
//!
//! Every amount is kept on a grid of 0.05 with two fraction digits.
//! Amounts are embedded verbatim in signed payloads, so the canonical
//! text form must be reproducible byte for byte.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Currency symbol appended to the canonical format
pub const SYMBOL: &str = "ɱ";

/// Number of fraction digits in the canonical format
pub const PRECISION: u32 = 2;

/// Smallest representable step (0.05)
pub const INCREMENT: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Increments per whole unit (1 / 0.05)
const STEPS_PER_UNIT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Hundredths per increment
const HUNDREDTHS_PER_STEP: i64 = 5;

/// Errors that can occur when working with Mani amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManiError {
    #[error("Invalid currency value: {0}")]
    Invalid(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,
}

/// A signed currency amount rounded to the nearest increment.
///
/// # Example
/// ```
/// use sumsy_core::Mani;
///
/// let balance = Mani::from(100);
/// let after = balance.subtract(&"30".parse().unwrap()).unwrap();
/// assert_eq!(after.format(), "70,00 ɱ");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mani(Decimal);

impl Mani {
    /// Zero amount constant
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding to the nearest increment (midpoint away from zero).
    pub fn new(value: Decimal) -> Result<Self, ManiError> {
        Ok(Self(quantize(value)?))
    }

    /// Create an amount from a number of increments
    pub fn from_increments(steps: i64) -> Result<Self, ManiError> {
        let hundredths = steps
            .checked_mul(HUNDREDTHS_PER_STEP)
            .ok_or(ManiError::Overflow)?;
        Ok(Self(Decimal::new(hundredths, PRECISION)))
    }

    /// Get the inner Decimal value
    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Integer representation in hundredths (the normalized form used for equality)
    pub fn int_value(&self) -> i64 {
        let mut scaled = self.0;
        scaled.rescale(PRECISION);
        // Values are built from checked arithmetic, the mantissa of a
        // two-digit decimal always fits once it went through quantize.
        i64::try_from(scaled.mantissa()).unwrap_or(i64::MAX)
    }

    pub fn add(&self, other: &Mani) -> Result<Mani, ManiError> {
        let sum = self.0.checked_add(other.0).ok_or(ManiError::Overflow)?;
        Mani::new(sum)
    }

    pub fn subtract(&self, other: &Mani) -> Result<Mani, ManiError> {
        let difference = self.0.checked_sub(other.0).ok_or(ManiError::Overflow)?;
        Mani::new(difference)
    }

    /// Multiply by a decimal factor, rounding the result to the increment
    pub fn multiply(&self, factor: Decimal) -> Result<Mani, ManiError> {
        let product = self.0.checked_mul(factor).ok_or(ManiError::Overflow)?;
        Mani::new(product)
    }

    /// Divide by a decimal divisor, rounding the result to the increment
    pub fn divide(&self, divisor: Decimal) -> Result<Mani, ManiError> {
        if divisor.is_zero() {
            return Err(ManiError::DivisionByZero);
        }
        let quotient = self.0.checked_div(divisor).ok_or(ManiError::Overflow)?;
        Mani::new(quotient)
    }

    /// Split into `parts` amounts that sum exactly to this amount.
    ///
    /// Parts differ by at most one increment; the larger parts come first.
    pub fn distribute(&self, parts: usize) -> Result<Vec<Mani>, ManiError> {
        if parts == 0 {
            return Err(ManiError::DivisionByZero);
        }
        let count = i64::try_from(parts).map_err(|_| ManiError::Overflow)?;
        let steps = self.int_value() / HUNDREDTHS_PER_STEP;
        let base = steps / count;
        let remainder = steps % count;
        let extra = remainder.signum();

        (0..count)
            .map(|i| {
                let share = if i < remainder.abs() { base + extra } else { base };
                Mani::from_increments(share)
            })
            .collect()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Canonical text form, e.g. `-30,00 ɱ`
    pub fn format(&self) -> String {
        let mut magnitude = self.0.abs();
        magnitude.rescale(PRECISION);
        let digits = magnitude.to_string().replace('.', ",");
        if self.is_negative() {
            format!("-{} {}", digits, SYMBOL)
        } else {
            format!("{} {}", digits, SYMBOL)
        }
    }
}

/// Round to the increment grid and fix the scale to two digits
fn quantize(value: Decimal) -> Result<Decimal, ManiError> {
    let steps = value
        .checked_mul(STEPS_PER_UNIT)
        .ok_or(ManiError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let mut quantized = steps
        .checked_div(STEPS_PER_UNIT)
        .ok_or(ManiError::Overflow)?;
    if quantized.is_zero() {
        // no negative zero
        quantized = Decimal::ZERO;
    }
    quantized.rescale(PRECISION);
    Ok(quantized)
}

impl fmt::Display for Mani {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl FromStr for Mani {
    type Err = ManiError;

    /// Accepts the canonical form as well as looser input such as `30`,
    /// `-12,5` or `1.000,00 ɱ` (`.` is a thousands separator).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ManiError::Invalid(s.to_string());

        let trimmed = s.trim();
        let body = trimmed.strip_suffix(SYMBOL).unwrap_or(trimmed).trim_end();
        let (negative, digits) = match body.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, body),
        };

        if digits.is_empty()
            || !digits.starts_with(|c: char| c.is_ascii_digit())
            || !digits.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
            || digits.matches(',').count() > 1
        {
            return Err(invalid());
        }

        let normalized: String = digits
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        let normalized = normalized.trim_end_matches('.');

        let value = Decimal::from_str(normalized).map_err(|_| invalid())?;
        Mani::new(if negative { -value } else { value })
    }
}

impl TryFrom<String> for Mani {
    type Error = ManiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mani> for String {
    fn from(mani: Mani) -> Self {
        mani.format()
    }
}

impl From<i64> for Mani {
    fn from(value: i64) -> Self {
        let mut whole = Decimal::from(value);
        whole.rescale(PRECISION);
        Self(whole)
    }
}

impl Neg for Mani {
    type Output = Mani;

    fn neg(self) -> Mani {
        if self.0.is_zero() {
            self
        } else {
            Mani(-self.0)
        }
    }
}

impl Default for Mani {
    fn default() -> Self {
        Self::ZERO
    }
}
