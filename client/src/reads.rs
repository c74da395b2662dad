//! Contract read layer
//!
//! Every read goes to the chain; nothing is cached. Results are point-in-time
//! values and callers refetch after any confirmed write.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use yield_math::{ApyCalculator, Fixed};

use crate::config::StakingConfig;
use crate::contracts::{IStakedToken, IERC20};
use crate::error::StakingError;
use crate::units::ten_pow;
use crate::wallet::{ChainReader, WalletProvider};

/// Allowances of at least this many whole tokens count as unlimited
pub const INFINITE_APPROVAL_TOKENS: u64 = 1_000_000_000;

/// One account's balances and allowance, read together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// BRLA held
    pub underlying: U256,
    /// stBRLA held
    pub staked: U256,
    /// BRLA the staking contract may pull
    pub allowance: U256,
}

/// Staking pool totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// stBRLA total supply
    pub total_supply: U256,
    /// BRLA held by the staking contract
    pub underlying_balance: U256,
}

impl PoolState {
    /// Underlying per share
    pub fn exchange_rate(&self) -> Result<Fixed, StakingError> {
        Ok(ApyCalculator::current_price(
            self.total_supply,
            self.underlying_balance,
        )?)
    }

    /// Shares minted for `amount` of underlying at the current rate
    pub fn shares_for(&self, amount: U256) -> U256 {
        if self.total_supply.is_zero() || self.underlying_balance.is_zero() {
            return amount;
        }
        amount.saturating_mul(self.total_supply) / self.underlying_balance
    }

    /// Underlying paid out for `shares` at the current rate
    pub fn underlying_for(&self, shares: U256) -> U256 {
        if self.total_supply.is_zero() {
            return shares;
        }
        shares.saturating_mul(self.underlying_balance) / self.total_supply
    }
}

#[derive(Clone)]
pub struct ContractReads {
    reader: Arc<dyn ChainReader>,
    wallet: Arc<dyn WalletProvider>,
    underlying: Address,
    staked: Address,
    infinite_threshold: U256,
}

impl ContractReads {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        wallet: Arc<dyn WalletProvider>,
        config: &StakingConfig,
    ) -> Self {
        Self {
            reader,
            wallet,
            underlying: config.underlying.address,
            staked: config.staked.address,
            infinite_threshold: U256::from(INFINITE_APPROVAL_TOKENS)
                .saturating_mul(ten_pow(config.underlying.decimals)),
        }
    }

    /// BRLA balance of `owner`
    pub async fn underlying_balance_of(&self, owner: Address) -> Result<U256, StakingError> {
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        let ret = self.call(self.underlying, data).await?;
        Ok(decode::<IERC20::balanceOfCall>(&ret)?._0)
    }

    /// stBRLA balance of `owner`
    pub async fn staked_balance_of(&self, owner: Address) -> Result<U256, StakingError> {
        let data = IStakedToken::balanceOfCall { owner }.abi_encode();
        let ret = self.call(self.staked, data).await?;
        Ok(decode::<IStakedToken::balanceOfCall>(&ret)?._0)
    }

    /// BRLA allowance granted by `owner` to the staking contract
    pub async fn allowance_of(&self, owner: Address) -> Result<U256, StakingError> {
        let data = IERC20::allowanceCall {
            owner,
            spender: self.staked,
        }
        .abi_encode();
        let ret = self.call(self.underlying, data).await?;
        Ok(decode::<IERC20::allowanceCall>(&ret)?._0)
    }

    /// stBRLA total supply
    pub async fn staked_total_supply(&self) -> Result<U256, StakingError> {
        let data = IStakedToken::totalSupplyCall {}.abi_encode();
        let ret = self.call(self.staked, data).await?;
        Ok(decode::<IStakedToken::totalSupplyCall>(&ret)?._0)
    }

    /// BRLA total supply
    pub async fn underlying_total_supply(&self) -> Result<U256, StakingError> {
        let data = IERC20::totalSupplyCall {}.abi_encode();
        let ret = self.call(self.underlying, data).await?;
        Ok(decode::<IERC20::totalSupplyCall>(&ret)?._0)
    }

    /// Connected account, or `WalletNotConnected`
    pub fn account(&self) -> Result<Address, StakingError> {
        self.wallet.account().ok_or(StakingError::WalletNotConnected)
    }

    /// Balances and allowance of the connected account
    pub async fn account_balances(&self) -> Result<AccountBalances, StakingError> {
        let owner = self.account()?;

        let (underlying, staked, allowance) = futures::try_join!(
            self.underlying_balance_of(owner),
            self.staked_balance_of(owner),
            self.allowance_of(owner),
        )?;

        Ok(AccountBalances {
            underlying,
            staked,
            allowance,
        })
    }

    /// Whether the current allowance already covers `amount`
    pub async fn has_sufficient_allowance(&self, amount: U256) -> Result<bool, StakingError> {
        let owner = self.account()?;
        Ok(self.allowance_of(owner).await? >= amount)
    }

    /// Whether the allowance is large enough to never need re-approving
    pub async fn has_infinite_approval(&self) -> Result<bool, StakingError> {
        let owner = self.account()?;
        Ok(self.allowance_of(owner).await? >= self.infinite_threshold)
    }

    /// Share price as reported by the staking contract itself
    pub async fn contract_price(&self) -> Result<Fixed, StakingError> {
        let data = IStakedToken::_currentPriceCall {}.abi_encode();
        let ret = self.call(self.staked, data).await?;
        Ok(Fixed::from_raw(decode::<IStakedToken::_currentPriceCall>(&ret)?._0))
    }

    /// Pool totals the exchange rate and APY are derived from
    pub async fn pool_state(&self) -> Result<PoolState, StakingError> {
        let (total_supply, underlying_balance) = futures::try_join!(
            self.staked_total_supply(),
            self.underlying_balance_of(self.staked),
        )?;

        Ok(PoolState {
            total_supply,
            underlying_balance,
        })
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, StakingError> {
        self.reader.call(to, Bytes::from(data)).await.map_err(|e| {
            log::debug!("eth_call to {} failed: {}", to, e);
            StakingError::Read(e.message)
        })
    }
}

fn decode<C: SolCall>(data: &[u8]) -> Result<C::Return, StakingError> {
    C::abi_decode_returns(data, true).map_err(|e| StakingError::Read(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{build_approve_request, build_stake_request, MAX_APPROVAL};
    use crate::sim::SimulatedChain;
    use crate::wallet::WalletProvider;

    const WAD: u128 = 1_000_000_000_000_000_000;

    fn setup() -> (Arc<SimulatedChain>, ContractReads) {
        let config = StakingConfig::default_polygon();
        let sim = Arc::new(SimulatedChain::with_config(&config));
        let reads = ContractReads::new(sim.clone(), sim.clone(), &config);
        (sim, reads)
    }

    #[tokio::test]
    async fn test_account_balances() {
        let (sim, reads) = setup();
        let user = sim.account().unwrap();
        sim.mint_underlying(user, U256::from(250 * WAD));

        let balances = reads.account_balances().await.unwrap();
        assert_eq!(balances.underlying, U256::from(250 * WAD));
        assert_eq!(balances.staked, U256::ZERO);
        assert_eq!(balances.allowance, U256::ZERO);
        assert!(!reads.has_sufficient_allowance(U256::from(1u8)).await.unwrap());
        assert!(reads.has_sufficient_allowance(U256::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn test_disconnected_account_reads_fail() {
        let (sim, reads) = setup();
        sim.set_account(None);
        assert_eq!(
            reads.account_balances().await,
            Err(StakingError::WalletNotConnected)
        );
    }

    #[tokio::test]
    async fn test_empty_pool_rate_is_one() {
        let (_sim, reads) = setup();
        let pool = reads.pool_state().await.unwrap();
        assert_eq!(pool, PoolState::default());
        assert_eq!(pool.exchange_rate().unwrap(), Fixed::ONE);
        assert_eq!(pool.shares_for(U256::from(100u8)), U256::from(100u8));
    }

    #[tokio::test]
    async fn test_read_failure_is_reported() {
        let (sim, reads) = setup();
        sim.fail_reads(true);
        assert!(matches!(
            reads.staked_total_supply().await,
            Err(StakingError::Read(_))
        ));
    }

    async fn mine(sim: &SimulatedChain, request: crate::wallet::TransactionRequest) {
        let hash = sim.send_transaction(request).await.unwrap();
        assert!(sim.transaction_receipt(hash).await.unwrap().unwrap().success);
    }

    fn approve(amount: U256) -> crate::wallet::TransactionRequest {
        let config = StakingConfig::default_polygon();
        build_approve_request(
            config.underlying.address,
            config.staked.address,
            amount,
            config.chain_id,
            config.approve_gas,
        )
    }

    #[tokio::test]
    async fn test_infinite_approval_threshold() {
        let (sim, reads) = setup();
        let billion = U256::from(INFINITE_APPROVAL_TOKENS) * U256::from(WAD);
        assert!(!reads.has_infinite_approval().await.unwrap());

        mine(&sim, approve(billion - U256::from(1u8))).await;
        assert!(!reads.has_infinite_approval().await.unwrap());
        assert!(reads.has_sufficient_allowance(U256::from(WAD)).await.unwrap());

        mine(&sim, approve(billion)).await;
        assert!(reads.has_infinite_approval().await.unwrap());

        mine(&sim, approve(MAX_APPROVAL)).await;
        assert!(reads.has_infinite_approval().await.unwrap());
    }

    #[tokio::test]
    async fn test_contract_price_matches_pool_rate() {
        let (sim, reads) = setup();
        assert_eq!(reads.contract_price().await.unwrap(), Fixed::ONE);

        let config = StakingConfig::default_polygon();
        let user = sim.account().unwrap();
        sim.mint_underlying(user, U256::from(100 * WAD));
        mine(&sim, approve(MAX_APPROVAL)).await;
        mine(
            &sim,
            build_stake_request(
                config.staked.address,
                user,
                U256::from(100 * WAD),
                config.chain_id,
                config.stake_gas,
            ),
        )
        .await;
        sim.accrue_rewards(U256::from(50 * WAD));

        let price = reads.contract_price().await.unwrap();
        let pool = reads.pool_state().await.unwrap();
        assert_eq!(price, pool.exchange_rate().unwrap());
        assert_eq!(price, Fixed::divide_integers(U256::from(3u8), U256::from(2u8)).unwrap());
    }

    #[test]
    fn test_pool_conversions() {
        let pool = PoolState {
            total_supply: U256::from(100 * WAD),
            underlying_balance: U256::from(110 * WAD),
        };
        assert_eq!(pool.underlying_for(U256::from(10 * WAD)), U256::from(11 * WAD));
        assert_eq!(pool.shares_for(U256::from(11 * WAD)), U256::from(10 * WAD));
    }
}
