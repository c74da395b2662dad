//! Conversion between human decimal strings and token base units

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("not a decimal number")]
    Invalid,

    #[error("more than {max} decimal places")]
    TooManyDecimals { max: u8 },

    #[error("amount too large")]
    Overflow,
}

/// 10^decimals
pub fn ten_pow(decimals: u8) -> U256 {
    (0..decimals).fold(U256::from(1u8), |acc, _| acc.saturating_mul(U256::from(10u8)))
}

/// Parse an unsigned decimal string ("100", "0.5", ".5", "12.") into base units
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, UnitsError> {
    let value = value.trim();

    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitsError::Invalid);
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(UnitsError::Invalid);
    }
    if frac_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals { max: decimals });
    }

    let padding = decimals as usize - frac_part.len();
    let digits = int_part.bytes().chain(frac_part.bytes());

    let mut result = U256::ZERO;
    for b in digits {
        result = result
            .checked_mul(U256::from(10u8))
            .and_then(|r| r.checked_add(U256::from(b - b'0')))
            .ok_or(UnitsError::Overflow)?;
    }
    for _ in 0..padding {
        result = result
            .checked_mul(U256::from(10u8))
            .ok_or(UnitsError::Overflow)?;
    }

    Ok(result)
}

/// Format base units as a decimal string with trailing zeros trimmed
pub fn format_units(value: U256, decimals: u8) -> String {
    let unit = ten_pow(decimals);
    let whole = value / unit;
    let frac = value % unit;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
