//! Unstake submission with a client-side balance check

use alloy_primitives::{Address, U256};

use crate::config::StakingConfig;
use crate::contracts::build_unstake_request;
use crate::error::{Operation, StakingError};
use crate::reads::ContractReads;
use crate::tx_state::TransactionState;
use crate::wallet::TxReceipt;

use super::TxSubmitter;

/// Burns stBRLA for BRLA; no approval needed
pub struct UnstakingController {
    submitter: TxSubmitter,
    reads: ContractReads,
    staking: Address,
    gas: u64,
    state: TransactionState,
}

impl UnstakingController {
    pub fn new(submitter: TxSubmitter, reads: ContractReads, config: &StakingConfig) -> Self {
        Self {
            submitter,
            reads,
            staking: config.staked.address,
            gas: config.unstake_gas,
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

    /// `unstake(account, account, amount)`
    ///
    /// The staked balance is read and checked before anything reaches the
    /// wallet; the contract still has the final say.
    pub async fn unstake(&mut self, amount: U256) -> Result<TxReceipt, StakingError> {
        let (staking, gas) = (self.staking, self.gas);
        let chain_id = self.submitter.chain_id();
        let reads = &self.reads;

        self.submitter
            .run(Operation::Unstake, &mut self.state, |account| async move {
                let available = reads.staked_balance_of(account).await?;
                if amount > available {
                    log::warn!("Unstake of {} exceeds balance {}", amount, available);
                    return Err(StakingError::InsufficientBalance {
                        requested: amount,
                        available,
                    });
                }

                log::info!("Unstaking {} for {}", amount, account);
                Ok(build_unstake_request(staking, account, amount, chain_id, gas))
            })
            .await
    }
}
