//! Allowance grants on the underlying token

use alloy_primitives::{Address, U256};

use crate::config::StakingConfig;
use crate::contracts::{build_approve_request, MAX_APPROVAL};
use crate::error::{Operation, StakingError};
use crate::tx_state::TransactionState;
use crate::wallet::TxReceipt;

use super::TxSubmitter;

/// Grants the staking contract an allowance on the underlying token
///
/// Only signals confirmation; callers refetch the allowance afterwards.
pub struct ApprovalController {
    submitter: TxSubmitter,
    token: Address,
    spender: Address,
    gas: u64,
    state: TransactionState,
}

impl ApprovalController {
    pub fn new(submitter: TxSubmitter, config: &StakingConfig) -> Self {
        Self {
            submitter,
            token: config.underlying.address,
            spender: config.staked.address,
            gas: config.approve_gas,
            state: TransactionState::new(),
        }
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    /// Forget the last attempt; the owning modal calls this on reopen
    pub(crate) fn reset_state(&mut self) {
        self.state.reset();
    }

    /// Approve `amount`, or the maximum when None
    pub async fn approve(&mut self, amount: Option<U256>) -> Result<TxReceipt, StakingError> {
        let amount = amount.unwrap_or(MAX_APPROVAL);
        let (token, spender, gas) = (self.token, self.spender, self.gas);
        let chain_id = self.submitter.chain_id();

        log::info!("Approving {} on {} for {}", amount, token, spender);

        self.submitter
            .run(Operation::Approve, &mut self.state, |_| async move {
                Ok(build_approve_request(token, spender, amount, chain_id, gas))
            })
            .await
    }

    pub async fn approve_infinite(&mut self) -> Result<TxReceipt, StakingError> {
        self.approve(None).await
    }
}
