//! Projected rewards for a stake at a given APY

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::apy::BASIS_POINTS;

/// Projected rewards in the token's base units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsEstimate {
    pub daily: U256,
    pub weekly: U256,
    pub monthly: U256,
    pub yearly: U256,
}

/// Simple-interest projection of `amount` at `apy_basis_points`
///
/// Daily is a 365th of the yearly figure; weekly and monthly are 7 and 30
/// days of it. A zero or negative APY projects nothing.
pub fn project_rewards(amount: U256, apy_basis_points: i64) -> RewardsEstimate {
    if amount.is_zero() || apy_basis_points <= 0 {
        return RewardsEstimate::default();
    }

    let bps = U256::from(apy_basis_points.unsigned_abs());
    let yearly = amount.saturating_mul(bps) / U256::from(BASIS_POINTS);
    let daily = yearly / U256::from(365u32);

    RewardsEstimate {
        daily,
        weekly: daily * U256::from(7u32),
        monthly: daily * U256::from(30u32),
        yearly,
    }
}
