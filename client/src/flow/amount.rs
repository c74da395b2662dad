//! Amount input validation shared by both flows

use alloy_primitives::U256;
use thiserror::Error;

use crate::units::{format_units, parse_units, UnitsError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Nothing entered yet; blocks the action without an inline message
    #[error("no amount entered")]
    Empty,

    #[error("Please enter a valid amount")]
    Invalid,

    #[error("Amount must be greater than 0")]
    NotPositive,

    #[error("Too many decimal places (max {max})")]
    TooManyDecimals { max: u8 },

    #[error("Insufficient {symbol} balance. Maximum: {maximum}")]
    ExceedsBalance { symbol: String, maximum: String },
}

impl AmountError {
    /// Inline message for the input, None when nothing should show
    pub fn inline_message(&self) -> Option<String> {
        match self {
            AmountError::Empty => None,
            other => Some(other.to_string()),
        }
    }
}

/// Parse `input` and check it against `balance`
pub fn validate_amount(
    input: &str,
    balance: U256,
    decimals: u8,
    symbol: &str,
) -> Result<U256, AmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AmountError::Empty);
    }

    if let Some(rest) = input.strip_prefix('-') {
        return match parse_units(rest, decimals) {
            Ok(_) | Err(UnitsError::TooManyDecimals { .. }) | Err(UnitsError::Overflow) => {
                Err(AmountError::NotPositive)
            }
            Err(UnitsError::Invalid) => Err(AmountError::Invalid),
        };
    }

    let exceeds = || AmountError::ExceedsBalance {
        symbol: symbol.to_string(),
        maximum: format_units(balance, decimals),
    };

    let amount = match parse_units(input, decimals) {
        Ok(amount) => amount,
        Err(UnitsError::Invalid) => return Err(AmountError::Invalid),
        Err(UnitsError::TooManyDecimals { max }) => {
            return Err(AmountError::TooManyDecimals { max })
        }
        Err(UnitsError::Overflow) => return Err(exceeds()),
    };

    if amount.is_zero() {
        return Err(AmountError::NotPositive);
    }
    if amount > balance {
        return Err(exceeds());
    }

    Ok(amount)
}
