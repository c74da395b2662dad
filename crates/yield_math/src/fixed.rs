//! Signed 64.64 fixed-point arithmetic
//!
//! Values are `i128` scaled by 2^64, the layout `ABDKMath64x64` uses on-chain,
//! so a price or rate computed here matches what a contract computes from the
//! same integers. Intermediates are widened to `U256`. Anything that lands
//! outside the `i128` range is `MathError::Overflow`, never wrapped.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::MathError;

/// Number of fractional bits
pub const FRACTION_BITS: usize = 64;

/// 2^64 as f64, for display conversions only
const SCALE_F64: f64 = 18_446_744_073_709_551_616.0;

/// Mask selecting the fractional bits of a widened product
const FRACTION_MASK: u128 = u64::MAX as u128;

/// Signed 64.64 fixed-point number
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fixed(i128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(1 << FRACTION_BITS);

    /// Largest whole number representable (0x7FFFFFFFFFFFFFFF)
    pub const MAX_INTEGER: u64 = i64::MAX as u64;

    /// Wrap an already-scaled value
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// Underlying scaled value
    pub const fn raw(self) -> i128 {
        self.0
    }

    /// Scale a whole number: `x << 64`
    pub fn from_integer(x: u64) -> Result<Self, MathError> {
        if x > Self::MAX_INTEGER {
            return Err(MathError::Overflow);
        }
        Ok(Self(i128::from(x) << FRACTION_BITS))
    }

    /// Truncate back to a whole number: `x >> 64`
    ///
    /// Arithmetic shift, so negative values round toward negative infinity.
    pub fn to_integer(self) -> i64 {
        // i128 >> 64 always fits in i64
        (self.0 >> FRACTION_BITS) as i64
    }

    /// Ratio of two unsigned integers: `(a << 64) / b`
    pub fn divide_integers(a: U256, b: U256) -> Result<Self, MathError> {
        if b.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        if a.bit_len() + FRACTION_BITS > 256 {
            return Err(MathError::Overflow);
        }
        let quotient = (a << FRACTION_BITS) / b;
        from_sign_and_magnitude(false, quotient)
    }

    /// Product: `(a * b) >> 64`, rounded toward negative infinity
    pub fn mul(self, other: Fixed) -> Result<Self, MathError> {
        let negative = (self.0 < 0) != (other.0 < 0);
        let product = magnitude(self.0)
            .checked_mul(magnitude(other.0))
            .ok_or(MathError::Overflow)?;

        let mut shifted = product >> FRACTION_BITS;
        let has_fraction = !(product & U256::from(FRACTION_MASK)).is_zero();
        if negative && has_fraction {
            shifted += U256::from(1u8);
        }
        from_sign_and_magnitude(negative, shifted)
    }

    /// Quotient: `(a << 64) / b`, truncated toward zero
    pub fn div(self, other: Fixed) -> Result<Self, MathError> {
        if other.0 == 0 {
            return Err(MathError::DivisionByZero);
        }
        let negative = (self.0 < 0) != (other.0 < 0);
        // |a| <= 2^127, so the shift stays well inside 256 bits
        let quotient = (magnitude(self.0) << FRACTION_BITS) / magnitude(other.0);
        from_sign_and_magnitude(negative, quotient)
    }

    /// Difference: `a - b`
    pub fn sub(self, other: Fixed) -> Result<Self, MathError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    /// Sum: `a + b`
    pub fn add(self, other: Fixed) -> Result<Self, MathError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Lossy conversion for display
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE_F64
    }
}

fn magnitude(x: i128) -> U256 {
    U256::from(x.unsigned_abs())
}

fn from_sign_and_magnitude(negative: bool, m: U256) -> Result<Fixed, MathError> {
    let m = u128::try_from(m).map_err(|_| MathError::Overflow)?;
    let raw = if negative {
        0i128.checked_sub_unsigned(m)
    } else {
        i128::try_from(m).ok()
    };
    raw.map(Fixed).ok_or(MathError::Overflow)
}
