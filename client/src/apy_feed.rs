//! Live APY from on-chain price snapshots

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use yield_math::{
    project_rewards, unix_now, ApyCalculator, ApyResult, Fixed, RewardsEstimate, SnapshotInfo,
};

use crate::error::StakingError;
use crate::reads::ContractReads;

/// Label of the snapshot taken when the feed first has no history
pub const INITIAL_SNAPSHOT: &str = "initial";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApyEstimate {
    Measured(ApyResult),
    /// No price history yet to measure against
    InsufficientData,
}

impl ApyEstimate {
    pub fn basis_points(&self) -> Option<i64> {
        match self {
            ApyEstimate::Measured(result) => Some(result.apy_basis_points),
            ApyEstimate::InsufficientData => None,
        }
    }

    /// Project rewards for `amount`; None without a measured APY
    pub fn project(&self, amount: U256) -> Option<RewardsEstimate> {
        self.basis_points().map(|bps| project_rewards(amount, bps))
    }
}

/// Snapshot store fed by pool reads
pub struct ApyFeed {
    reads: ContractReads,
    calculator: Mutex<ApyCalculator>,
}

impl ApyFeed {
    pub fn new(reads: ContractReads) -> Self {
        Self {
            reads,
            calculator: Mutex::new(ApyCalculator::new()),
        }
    }

    /// Current underlying per share
    pub async fn exchange_rate(&self) -> Result<Fixed, StakingError> {
        self.reads.pool_state().await?.exchange_rate()
    }

    pub async fn take_snapshot(&self, label: Option<&str>) -> Result<String, StakingError> {
        self.take_snapshot_at(unix_now(), label).await
    }

    pub async fn take_snapshot_at(
        &self,
        timestamp: u64,
        label: Option<&str>,
    ) -> Result<String, StakingError> {
        let pool = self.reads.pool_state().await?;
        let id = self.calculator.lock().await.take_snapshot_at(
            timestamp,
            pool.total_supply,
            pool.underlying_balance,
            label,
        )?;
        log::debug!("Snapshot {} at {}", id, timestamp);
        Ok(id)
    }

    /// APY from snapshot `id` to the live price
    pub async fn apy_since(&self, id: &str) -> Result<ApyResult, StakingError> {
        self.apy_since_at(id, unix_now()).await
    }

    pub async fn apy_since_at(&self, id: &str, now: u64) -> Result<ApyResult, StakingError> {
        let pool = self.reads.pool_state().await?;
        let result = self.calculator.lock().await.calculate_apy_from_snapshot_at(
            id,
            pool.total_supply,
            pool.underlying_balance,
            now,
        )?;
        Ok(result)
    }

    pub async fn apy_between(
        &self,
        start_id: &str,
        end_id: &str,
    ) -> Result<ApyResult, StakingError> {
        Ok(self.calculator.lock().await.calculate_apy(start_id, end_id)?)
    }

    /// Annualized APY from one reward distribution against the pool
    pub async fn estimate_from_reward(
        &self,
        reward: U256,
        distributions_per_year: u64,
    ) -> Result<ApyResult, StakingError> {
        let pool = self.reads.pool_state().await?;
        Ok(ApyCalculator::estimate_apy_from_reward(
            reward,
            pool.underlying_balance,
            distributions_per_year,
        )?)
    }

    pub async fn snapshots(&self) -> Vec<SnapshotInfo> {
        self.calculator.lock().await.snapshots()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.calculator.lock().await.snapshot_count()
    }

    pub async fn clear(&self) {
        self.calculator.lock().await.clear_snapshots();
    }

    pub async fn current_estimate(&self) -> Result<ApyEstimate, StakingError> {
        self.current_estimate_at(unix_now()).await
    }

    /// APY since the oldest snapshot
    ///
    /// With no history this records the first snapshot and reports
    /// `InsufficientData` rather than a made-up figure.
    pub async fn current_estimate_at(&self, now: u64) -> Result<ApyEstimate, StakingError> {
        let oldest = self.calculator.lock().await.snapshots().into_iter().next();

        let Some(oldest) = oldest else {
            self.take_snapshot_at(now, Some(INITIAL_SNAPSHOT)).await?;
            return Ok(ApyEstimate::InsufficientData);
        };
        if oldest.timestamp >= now {
            return Ok(ApyEstimate::InsufficientData);
        }

        let result = self.apy_since_at(&oldest.id, now).await?;
        Ok(ApyEstimate::Measured(result))
    }

    /// Rewards projection for `amount` at the current estimate
    pub async fn rewards_estimate(
        &self,
        amount: U256,
    ) -> Result<Option<RewardsEstimate>, StakingError> {
        Ok(self.current_estimate().await?.project(amount))
    }
}
