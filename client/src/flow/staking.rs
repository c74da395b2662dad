//! Staking modal state machine

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::config::{StakingConfig, TokenConfig};
use crate::controller::{ApprovalController, StakingController, TxSubmitter};
use crate::error::Operation;
use crate::reads::{AccountBalances, ContractReads};
use crate::units::format_units;

use super::{validate_amount, AmountError, FlowError, FlowSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakingStep {
    Input,
    /// Allowance too low, waiting for the user to approve
    Approve,
    Approving,
    /// Ready to stake
    Stake,
    Staking,
    Success,
}

/// Stake modal: input, optional approval, stake, success
pub struct StakingFlow {
    reads: ContractReads,
    approval: ApprovalController,
    staking: StakingController,
    underlying: TokenConfig,
    staked: TokenConfig,
    is_open: bool,
    step: StakingStep,
    input: String,
    amount: Result<U256, AmountError>,
    balances: Option<AccountBalances>,
    error: Option<FlowError>,
    summary: Option<FlowSummary>,
}

impl StakingFlow {
    pub fn new(submitter: TxSubmitter, reads: ContractReads, config: &StakingConfig) -> Self {
        Self {
            reads,
            approval: ApprovalController::new(submitter.clone(), config),
            staking: StakingController::new(submitter, config),
            underlying: config.underlying.clone(),
            staked: config.staked.clone(),
            is_open: false,
            step: StakingStep::Input,
            input: String::new(),
            amount: Err(AmountError::Empty),
            balances: None,
            error: None,
            summary: None,
        }
    }

    pub fn step(&self) -> StakingStep {
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

    pub fn balances(&self) -> Option<&AccountBalances> {
        self.balances.as_ref()
    }

    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn summary(&self) -> Option<&FlowSummary> {
        self.summary.as_ref()
    }

    pub fn approval(&self) -> &ApprovalController {
        &self.approval
    }

    pub fn staking(&self) -> &StakingController {
        &self.staking
    }

    /// Open the modal; a closed-to-open transition always starts clean
    pub async fn open(&mut self) -> Result<(), FlowError> {
        if !self.is_open {
            self.reset();
            self.is_open = true;
        }
        self.refresh().await
    }

    /// Stop tracking; an in-flight transaction still lands on chain
    pub fn close(&mut self) {
        self.is_open = false;
    }

    fn reset(&mut self) {
        self.step = StakingStep::Input;
        self.input.clear();
        self.amount = Err(AmountError::Empty);
        self.balances = None;
        self.error = None;
        self.summary = None;
        self.approval.reset_state();
        self.staking.reset_state();
    }

    /// Refetch balances and allowance, then re-validate the amount
    pub async fn refresh(&mut self) -> Result<(), FlowError> {
        let balances = self.reads.account_balances().await.map_err(|e| {
            log::warn!("Balance refresh failed: {}", e);
            FlowError::Read(e)
        })?;
        self.balances = Some(balances);
        self.revalidate();
        Ok(())
    }

    pub fn set_amount(&mut self, input: &str) {
        if self.step != StakingStep::Input {
            log::debug!("Ignoring amount edit in step {:?}", self.step);
            return;
        }
        self.input = input.to_string();
        self.revalidate();
    }

    /// Fill in the whole underlying balance
    pub fn set_max(&mut self) {
        if let Some(balances) = self.balances {
            let max = format_units(balances.underlying, self.underlying.decimals);
            self.set_amount(&max);
        }
    }

    fn revalidate(&mut self) {
        // Unknown balance validates against zero
        let balance = self.balances.map(|b| b.underlying).unwrap_or_default();
        self.amount = validate_amount(
            &self.input,
            balance,
            self.underlying.decimals,
            &self.underlying.symbol,
        );

        if self.step == StakingStep::Input {
            self.error = self.amount.clone().err().map(FlowError::Amount);
        }
    }

    /// Inline amount message, if any
    pub fn amount_message(&self) -> Option<String> {
        self.amount.as_ref().err().and_then(AmountError::inline_message)
    }

    pub fn can_continue(&self) -> bool {
        self.step == StakingStep::Input && self.amount.is_ok()
    }

    /// Leave input: straight to stake when the allowance already covers
    /// the amount, otherwise to approve
    pub async fn proceed(&mut self) -> Result<StakingStep, FlowError> {
        if self.step != StakingStep::Input {
            return Err(FlowError::OutOfOrder("continue"));
        }
        let amount = self.amount.clone()?;

        self.refresh().await?;
        let amount = match &self.amount {
            Ok(fresh) => *fresh,
            Err(e) => {
                log::debug!("Amount {} no longer valid: {}", amount, e);
                return Err(FlowError::Amount(e.clone()));
            }
        };

        let allowance = self.balances.map(|b| b.allowance).unwrap_or_default();
        self.error = None;
        self.step = if allowance >= amount {
            StakingStep::Stake
        } else {
            StakingStep::Approve
        };
        log::debug!("Staking flow: input -> {:?}", self.step);
        Ok(self.step)
    }

    /// Approve the maximum, then move on to stake
    pub async fn approve(&mut self) -> Result<(), FlowError> {
        if self.step != StakingStep::Approve {
            return Err(FlowError::OutOfOrder("approve"));
        }

        self.step = StakingStep::Approving;
        self.error = None;

        match self.approval.approve_infinite().await {
            Ok(_) => {
                self.step = StakingStep::Stake;
                if let Err(e) = self.refresh().await {
                    log::warn!("Allowance refresh after approval failed: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                let err = FlowError::transaction(Operation::Approve, e);
                self.step = StakingStep::Approve;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub async fn stake(&mut self) -> Result<&FlowSummary, FlowError> {
        if self.step != StakingStep::Stake {
            return Err(FlowError::OutOfOrder("stake"));
        }
        // Balance may have moved since proceed; send the user back to fix it
        let amount = match &self.amount {
            Ok(amount) => *amount,
            Err(e) => {
                log::debug!("Staking flow: stale amount, stake -> input");
                let err = FlowError::Amount(e.clone());
                self.step = StakingStep::Input;
                self.error = Some(err.clone());
                return Err(err);
            }
        };

        self.step = StakingStep::Staking;
        self.error = None;

        let quoted = match self.reads.pool_state().await {
            Ok(pool) => pool.shares_for(amount),
            Err(e) => {
                log::warn!("Pool read failed, quoting 1:1: {}", e);
                amount
            }
        };

        match self.staking.stake(amount).await {
            Ok(receipt) => {
                let message = format!(
                    "{} {} staked, ≈{} {} received.",
                    format_units(amount, self.underlying.decimals),
                    self.underlying.symbol,
                    format_units(quoted, self.staked.decimals),
                    self.staked.symbol,
                );
                log::info!("{}", message);

                self.step = StakingStep::Success;
                if let Err(e) = self.refresh().await {
                    log::warn!("Balance refresh after stake failed: {}", e);
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
                let err = FlowError::transaction(Operation::Stake, e);
                self.step = StakingStep::Stake;
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
    use crate::error::StakingError;
    use crate::sim::SimulatedChain;
    use crate::tx_state::TxPhase;
    use crate::wallet::{codes, ProviderError, WalletProvider};
    use std::sync::Arc;

    const WAD: u128 = 1_000_000_000_000_000_000;

    fn flow(sim: &Arc<SimulatedChain>, config: &StakingConfig) -> StakingFlow {
        let reads = ContractReads::new(sim.clone(), sim.clone(), config);
        StakingFlow::new(submitter(sim, config), reads, config)
    }

    #[tokio::test]
    async fn test_invalid_amounts_block_continue() {
        let (sim, config) = setup();
        sim.mint_underlying(sim.account().unwrap(), U256::from(10 * WAD));
        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();

        assert!(!flow.can_continue());
        for input in ["abc", "0", "-1", "11"] {
            flow.set_amount(input);
            assert!(!flow.can_continue(), "{} accepted", input);
            assert!(flow.error().is_some());
        }
        assert_eq!(
            flow.amount_message().as_deref(),
            Some("Insufficient BRLA balance. Maximum: 10")
        );

        flow.set_max();
        assert!(flow.can_continue());
        assert_eq!(flow.amount(), Some(U256::from(10 * WAD)));
    }

    #[tokio::test]
    async fn test_infinite_allowance_skips_approve() {
        let (sim, config) = setup();
        let user = sim.account().unwrap();
        sim.mint_underlying(user, U256::from(5 * WAD));
        ApprovalController::new(submitter(&sim, &config), &config)
            .approve_infinite()
            .await
            .unwrap();

        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();
        flow.set_amount("5");
        assert_eq!(flow.proceed().await.unwrap(), StakingStep::Stake);
        assert_eq!(flow.approval().state().hash(), None);
    }

    #[tokio::test]
    async fn test_failed_stake_returns_to_stake() {
        let (sim, config) = setup();
        sim.mint_underlying(sim.account().unwrap(), U256::from(5 * WAD));
        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();
        flow.set_amount("1");
        flow.proceed().await.unwrap();
        flow.approve().await.unwrap();

        sim.set_gas_funds(false);
        let err = flow.stake().await.unwrap_err();
        assert_eq!(err.staking_error(), Some(&StakingError::InsufficientFunds));
        assert_eq!(flow.step(), StakingStep::Stake);
        assert_eq!(flow.input(), "1");

        sim.set_gas_funds(true);
        flow.stake().await.unwrap();
        assert_eq!(flow.step(), StakingStep::Success);
    }

    #[tokio::test]
    async fn test_reopen_resets() {
        let (sim, config) = setup();
        sim.mint_underlying(sim.account().unwrap(), U256::from(5 * WAD));
        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();
        flow.set_amount("2");
        flow.proceed().await.unwrap();
        sim.fail_next_send(ProviderError::new(codes::USER_REJECTED, "denied"));
        assert!(flow.approve().await.is_err());
        assert!(flow.error().is_some());
        assert_eq!(flow.approval().state().phase(), TxPhase::Failed);

        flow.close();
        flow.open().await.unwrap();
        assert_eq!(flow.step(), StakingStep::Input);
        assert_eq!(flow.input(), "");
        assert!(flow.error().is_none());
        assert!(flow.summary().is_none());
        assert_eq!(sim.allowance(sim.account().unwrap()), U256::ZERO);

        // Controller state does not leak into the new session either
        assert_eq!(flow.approval().state().phase(), TxPhase::Idle);
        assert_eq!(flow.approval().state().error(), None);
        assert_eq!(flow.approval().state().hash(), None);
        assert_eq!(flow.staking().state().phase(), TxPhase::Idle);
    }

    #[tokio::test]
    async fn test_stale_amount_returns_to_input() {
        let (sim, config) = setup();
        let user = sim.account().unwrap();
        sim.mint_underlying(user, U256::from(10 * WAD));
        ApprovalController::new(submitter(&sim, &config), &config)
            .approve_infinite()
            .await
            .unwrap();

        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();
        flow.set_amount("10");
        assert_eq!(flow.proceed().await.unwrap(), StakingStep::Stake);

        // Half the balance leaves through another session
        StakingController::new(submitter(&sim, &config), &config)
            .stake(U256::from(5 * WAD))
            .await
            .unwrap();
        flow.refresh().await.unwrap();

        let err = flow.stake().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Amount(AmountError::ExceedsBalance {
                symbol: "BRLA".to_string(),
                maximum: "5".to_string(),
            })
        );
        assert_eq!(flow.step(), StakingStep::Input);
        assert_eq!(flow.error(), Some(&err));
        assert!(flow.staking().state().hash().is_none());

        flow.set_amount("5");
        assert!(flow.can_continue());
        assert_eq!(flow.proceed().await.unwrap(), StakingStep::Stake);
        flow.stake().await.unwrap();
        assert_eq!(flow.step(), StakingStep::Success);
        assert_eq!(sim.staked_balance(user), U256::from(10 * WAD));
    }

    #[tokio::test]
    async fn test_out_of_order_actions() {
        let (sim, config) = setup();
        let mut flow = flow(&sim, &config);
        flow.open().await.unwrap();

        assert_eq!(flow.approve().await, Err(FlowError::OutOfOrder("approve")));
        assert!(matches!(flow.stake().await, Err(FlowError::OutOfOrder("stake"))));
        assert!(matches!(flow.proceed().await, Err(FlowError::Amount(AmountError::Empty))));
    }
}
