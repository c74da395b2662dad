//! Staking client errors and provider error classification

use std::fmt;

use alloy_primitives::{TxHash, U256};
use thiserror::Error;
use yield_math::MathError;

use crate::units::UnitsError;
use crate::wallet::{codes, ProviderError};

/// Write operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Approve,
    Stake,
    Unstake,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Approve => "approve",
            Operation::Stake => "stake",
            Operation::Unstake => "unstake",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("wallet not connected")]
    WalletNotConnected,

    /// No active connector can send arbitrary contract calls
    #[error("no wallet connector capable of contract calls")]
    WalletCapability,

    #[error("network switch to chain {chain_id} failed: {reason}")]
    NetworkSwitchFailed { chain_id: u64, reason: String },

    /// User declined to sign
    #[error("transaction rejected by user")]
    TransactionRejected,

    /// Not enough gas token to pay for the transaction
    #[error("insufficient funds for gas")]
    InsufficientFunds,

    /// Stake reverted on allowance
    #[error("insufficient allowance")]
    InsufficientAllowance,

    /// Checked before submission: more than the account holds
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: U256, available: U256 },

    #[error("network error: {0}")]
    Network(String),

    /// Unclassified provider failure, raw message preserved
    #[error("transaction failed: {0}")]
    UnknownTransaction(String),

    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),

    #[error("transaction {0} not confirmed in time")]
    ConfirmationTimeout(TxHash),

    #[error("chain read failed: {0}")]
    Read(String),

    #[error("invalid amount: {0}")]
    Amount(#[from] UnitsError),

    #[error(transparent)]
    Math(#[from] MathError),
}

impl StakingError {
    /// Message suitable for an inline error next to the action that failed
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            StakingError::WalletNotConnected => "Wallet not connected.".to_string(),
            StakingError::WalletCapability => {
                "EVM wallet required. Please connect with Coinbase Wallet or MetaMask.".to_string()
            }
            StakingError::NetworkSwitchFailed { .. } => {
                "Failed to switch network. Please switch manually.".to_string()
            }
            StakingError::TransactionRejected => "Transaction was rejected by user.".to_string(),
            StakingError::InsufficientFunds => "Insufficient funds for gas fees.".to_string(),
            StakingError::InsufficientAllowance => {
                "Insufficient allowance. Please approve first.".to_string()
            }
            StakingError::InsufficientBalance { .. } => "Insufficient balance.".to_string(),
            StakingError::Network(_) => "Network error. Please check your connection.".to_string(),
            StakingError::UnknownTransaction(raw) => {
                format!("{} Please try again. ({})", failure_prefix(op), raw)
            }
            other => format!("{} Please try again. ({})", failure_prefix(op), other),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, StakingError::TransactionRejected)
    }
}

fn failure_prefix(op: Operation) -> &'static str {
    match op {
        Operation::Approve => "Approval failed.",
        Operation::Stake => "Staking failed.",
        Operation::Unstake => "Unstaking failed.",
    }
}

/// Map a provider failure from a write path into the error taxonomy
///
/// Structured EIP-1193 codes are trusted first. Message matching is the
/// fallback for providers that only send text. Allowance reverts are only
/// recognised on the stake path.
pub fn classify_provider_error(err: &ProviderError, op: Operation) -> StakingError {
    match err.code {
        Some(codes::USER_REJECTED) => return StakingError::TransactionRejected,
        Some(codes::DISCONNECTED) | Some(codes::CHAIN_DISCONNECTED) => {
            return StakingError::Network(err.message.clone())
        }
        _ => {}
    }

    let message = err.message.to_lowercase();
    if message.contains("rejected") || message.contains("denied") {
        StakingError::TransactionRejected
    } else if message.contains("insufficient funds") {
        StakingError::InsufficientFunds
    } else if op == Operation::Stake && message.contains("allowance") {
        StakingError::InsufficientAllowance
    } else if message.contains("network") || message.contains("timeout") {
        StakingError::Network(err.message.clone())
    } else {
        StakingError::UnknownTransaction(err.message.clone())
    }
}
