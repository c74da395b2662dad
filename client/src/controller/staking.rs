//! Stake submission

use alloy_primitives::{Address, U256};

use crate::config::StakingConfig;
use crate::contracts::build_stake_request;
use crate::error::{Operation, StakingError};
use crate::tx_state::TransactionState;
use crate::wallet::TxReceipt;

use super::TxSubmitter;

/// Stakes underlying for the connected account
pub struct StakingController {
    submitter: TxSubmitter,
    staking: Address,
    gas: u64,
    state: TransactionState,
}

impl StakingController {
    pub fn new(submitter: TxSubmitter, config: &StakingConfig) -> Self {
        Self {
            submitter,
            staking: config.staked.address,
            gas: config.stake_gas,
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

    /// `stake(account, amount)`; the beneficiary is always the signer
    pub async fn stake(&mut self, amount: U256) -> Result<TxReceipt, StakingError> {
        let (staking, gas) = (self.staking, self.gas);
        let chain_id = self.submitter.chain_id();

        self.submitter
            .run(Operation::Stake, &mut self.state, |account| async move {
                log::info!("Staking {} for {}", amount, account);
                Ok(build_stake_request(staking, account, amount, chain_id, gas))
            })
            .await
    }
}
