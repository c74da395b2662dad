//! Staking and unstaking interaction flows
//!
//! Each flow sequences one modal: amount entry, the writes it needs, and a
//! success summary. Methods take `&mut self`, so one flow never has two
//! transactions in flight.

mod amount;
mod staking;
mod unstaking;

pub use amount::{validate_amount, AmountError};
pub use staking::{StakingFlow, StakingStep};
pub use unstaking::{UnstakingFlow, UnstakingStep};

use std::fmt;

use alloy_primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Operation, StakingError};

/// Error attached to a flow, rendered inline next to the failed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    Amount(AmountError),
    Transaction { op: Operation, error: StakingError },
    /// Balance or allowance refresh failed
    Read(StakingError),
    /// Action not available in the current step
    OutOfOrder(&'static str),
}

impl FlowError {
    fn transaction(op: Operation, error: StakingError) -> Self {
        FlowError::Transaction { op, error }
    }

    /// The underlying transaction error, if this is one
    pub fn staking_error(&self) -> Option<&StakingError> {
        match self {
            FlowError::Transaction { error, .. } | FlowError::Read(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::Amount(e) => write!(f, "{}", e),
            FlowError::Transaction { op, error } => f.write_str(&error.user_message(*op)),
            FlowError::Read(_) => f.write_str("Failed to load balances. Please try again."),
            FlowError::OutOfOrder(action) => write!(f, "Cannot {} right now.", action),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<AmountError> for FlowError {
    fn from(e: AmountError) -> Self {
        FlowError::Amount(e)
    }
}

/// What a completed flow did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub hash: TxHash,
    /// Amount the user gave up, in base units
    pub sent: U256,
    /// Amount quoted back at the pre-submission exchange rate
    pub received: U256,
    pub message: String,
}
