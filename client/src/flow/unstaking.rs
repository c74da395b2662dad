//! Unstaking modal state machine

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::config::{StakingConfig, TokenConfig};
use crate::controller::{TxSubmitter, UnstakingController};
use crate::error::Operation;
use crate::reads::ContractReads;
use crate::units::format_units;

use super::{validate_amount, AmountError, FlowError, FlowSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnstakingStep {
    Input,
    Unstaking,
    Success,
}

/// Unstake modal: input, unstake, success
pub struct UnstakingFlow {
    reads: ContractReads,
    unstaking: UnstakingController,
    underlying: TokenConfig,
    staked: TokenConfig,
    is_open: bool,
    step: UnstakingStep,
    input: String,
    amount: Result<U256, AmountError>,
    staked_balance: Option<U256>,
    error: Option<FlowError>,
    summary: Option<FlowSummary>,
}

impl UnstakingFlow {
    pub fn new(submitter: TxSubmitter, reads: ContractReads, config: &StakingConfig) -> Self {
        Self {
            unstaking: UnstakingController::new(submitter, reads.clone(), config),
            reads,
            underlying: config.underlying.clone(),
            staked: config.staked.clone(),
            is_open: false,
            step: UnstakingStep::Input,
            input: String::new(),
            amount: Err(AmountError::Empty),
            staked_balance: None,
            error: None,
            summary: None,
        }
    }

    pub fn step(&self) -> UnstakingStep {
        self.step
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn amount(&self) -> Option<U256> {
        self.amount.as_ref().ok().copied()
    }

    pub fn staked_balance(&self) -> Option<U256> {
        self.staked_balance
    }

    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn summary(&self) -> Option<&FlowSummary> {
        self.summary.as_ref()
    }

    pub fn controller(&self) -> &UnstakingController {
        &self.unstaking
    }

    pub async fn open(&mut self) -> Result<(), FlowError> {
        if !self.is_open {
            self.step = UnstakingStep::Input;
            self.input.clear();
            self.amount = Err(AmountError::Empty);
            self.staked_balance = None;
            self.error = None;
            self.summary = None;
            self.unstaking.reset_state();
            self.is_open = true;
        }
        self.refresh().await
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub async fn refresh(&mut self) -> Result<(), FlowError> {
        let owner = self.reads.account().map_err(FlowError::Read)?;
        let balance = self
            .reads
            .staked_balance_of(owner)
            .await
            .map_err(FlowError::Read)?;
        self.staked_balance = Some(balance);
        self.revalidate();
        Ok(())
    }

    pub fn set_amount(&mut self, input: &str) {
        if self.step != UnstakingStep::Input {
            return;
        }
        self.input = input.to_string();
        self.revalidate();
    }

    pub fn set_max(&mut self) {
        if let Some(balance) = self.staked_balance {
            let max = format_units(balance, self.staked.decimals);
            self.set_amount(&max);
        }
    }

    fn revalidate(&mut self) {
        self.amount = validate_amount(
            &self.input,
            self.staked_balance.unwrap_or_default(),
            self.staked.decimals,
            &self.staked.symbol,
        );
        if self.step == UnstakingStep::Input {
            self.error = self.amount.clone().err().map(FlowError::Amount);
        }
    }

    pub fn amount_message(&self) -> Option<String> {
        self.amount.as_ref().err().and_then(AmountError::inline_message)
    }

    pub fn can_continue(&self) -> bool {
        self.step == UnstakingStep::Input && self.amount.is_ok()
    }

    /// Submit the unstake; failures land back on input with the error
    pub async fn unstake(&mut self) -> Result<&FlowSummary, FlowError> {
        if self.step != UnstakingStep::Input {
            return Err(FlowError::OutOfOrder("unstake"));
        }
        let amount = self.amount.clone()?;

        self.step = UnstakingStep::Unstaking;
        self.error = None;

        let quoted = match self.reads.pool_state().await {
            Ok(pool) => pool.underlying_for(amount),
            Err(e) => {
                log::warn!("Pool read failed, quoting 1:1: {}", e);
                amount
            }
        };

        match self.unstaking.unstake(amount).await {
            Ok(receipt) => {
                let message = format!(
                    "{} {} unstaked, ≈{} {} received.",
                    format_units(amount, self.staked.decimals),
                    self.staked.symbol,
                    format_units(quoted, self.underlying.decimals),
                    self.underlying.symbol,
                );
                log::info!("{}", message);

                self.step = UnstakingStep::Success;
                if let Err(e) = self.refresh().await {
                    log::warn!("Balance refresh after unstake failed: {}", e);
                }
                let summary = self.summary.insert(FlowSummary {
                    hash: receipt.hash,
                    sent: amount,
                    received: quoted,
                    message,
                });
                Ok(&*summary)
            }
            Err(e) => {
                let err = FlowError::transaction(Operation::Unstake, e);
                self.step = UnstakingStep::Input;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::*;
    use crate::controller::{ApprovalController, StakingController};
    use crate::error::StakingError;
    use crate::sim::SimulatedChain;
    use crate::tx_state::TxPhase;
    use crate::wallet::WalletProvider;
    use std::sync::Arc;

    const WAD: u128 = 1_000_000_000_000_000_000;

    async fn staked_setup(stake: u128) -> (Arc<SimulatedChain>, StakingConfig, UnstakingFlow) {
        let (sim, config) = setup();
        let user = sim.account().unwrap();
        sim.mint_underlying(user, U256::from(stake * WAD));
        ApprovalController::new(submitter(&sim, &config), &config)
            .approve_infinite()
            .await
            .unwrap();
        StakingController::new(submitter(&sim, &config), &config)
            .stake(U256::from(stake * WAD))
            .await
            .unwrap();

        let reads = ContractReads::new(sim.clone(), sim.clone(), &config);
        let flow = UnstakingFlow::new(submitter(&sim, &config), reads, &config);
        (sim, config, flow)
    }

    #[tokio::test]
    async fn test_unstake_with_rewards() {
        let (sim, _config, mut flow) = staked_setup(100).await;
        sim.accrue_rewards(U256::from(10 * WAD));

        flow.open().await.unwrap();
        flow.set_amount("50");
        let summary = flow.unstake().await.unwrap().clone();

        assert_eq!(summary.message, "50 stBRLA unstaked, ≈55 BRLA received.");
        assert_eq!(flow.step(), UnstakingStep::Success);
        assert_eq!(flow.staked_balance(), Some(U256::from(50 * WAD)));
    }

    #[tokio::test]
    async fn test_revert_returns_to_input() {
        let (sim, _config, mut flow) = staked_setup(10).await;
        flow.open().await.unwrap();
        flow.set_amount("1");

        sim.revert_next();
        let err = flow.unstake().await.unwrap_err();
        assert!(matches!(
            err.staking_error(),
            Some(StakingError::TransactionReverted(_))
        ));
        assert_eq!(flow.step(), UnstakingStep::Input);
        assert_eq!(flow.input(), "1");
        assert!(flow.can_continue());
    }

    #[tokio::test]
    async fn test_reopen_clears_failed_attempt() {
        let (sim, _config, mut flow) = staked_setup(10).await;
        flow.open().await.unwrap();
        flow.set_amount("1");
        sim.revert_next();
        assert!(flow.unstake().await.is_err());
        assert_eq!(flow.controller().state().phase(), TxPhase::Failed);

        flow.close();
        flow.open().await.unwrap();
        assert_eq!(flow.step(), UnstakingStep::Input);
        assert_eq!(flow.input(), "");
        assert!(flow.error().is_none());
        assert_eq!(flow.controller().state().phase(), TxPhase::Idle);
        assert_eq!(flow.controller().state().error(), None);
        assert_eq!(flow.controller().state().hash(), None);
    }
}
