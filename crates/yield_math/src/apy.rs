//! APY calculator over stBRLA price snapshots
//!
//! The stBRLA price is the pool's underlying BRLA balance divided by the stBRLA
//! total supply. Yield accrues as that ratio grows, so two observations of the
//! price at two points in time are enough to annualize a return.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::MathError;
use crate::fixed::Fixed;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// 10,000 bps = 100%
pub const BASIS_POINTS: u64 = 10_000;

/// Distributions per year assumed when a reward cadence is not known
pub const DEFAULT_DISTRIBUTIONS_PER_YEAR: u64 = 12;

/// Price observation at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Underlying balance / total supply
    pub price: Fixed,
}

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub timestamp: u64,
    pub price: Fixed,
}

/// Annualized yield between two price points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApyResult {
    /// `apy_basis_points / 100`
    pub apy_percent: f64,
    pub apy_basis_points: i64,
    /// Length of the measurement window
    pub time_period_days: f64,
    /// Price at the start of the window (None for reward estimates)
    pub start_price: Option<Fixed>,
    /// Price at the end of the window, or the live price when measured
    /// against the chain (None for reward estimates)
    pub end_price: Option<Fixed>,
}

/// Snapshot store plus the APY formulas that read it
#[derive(Debug, Default)]
pub struct ApyCalculator {
    snapshots: HashMap<String, PriceSnapshot>,
    sequence: u64,
}

impl ApyCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price of one share in underlying units
    ///
    /// An empty pool (zero supply) prices at exactly 1, the rate every pool
    /// starts from before its first stake.
    pub fn current_price(total_supply: U256, underlying_balance: U256) -> Result<Fixed, MathError> {
        if total_supply.is_zero() {
            return Ok(Fixed::ONE);
        }
        Fixed::divide_integers(underlying_balance, total_supply)
    }

    /// Record the current price now, returning the id it was stored under
    pub fn take_snapshot(
        &mut self,
        total_supply: U256,
        underlying_balance: U256,
        label: Option<&str>,
    ) -> Result<String, MathError> {
        self.take_snapshot_at(unix_now(), total_supply, underlying_balance, label)
    }

    /// Record the current price at an explicit timestamp
    ///
    /// A label that is already in use is overwritten. Without a label an id
    /// of the form `snapshot_<timestamp>_<sequence>` is generated.
    pub fn take_snapshot_at(
        &mut self,
        timestamp: u64,
        total_supply: U256,
        underlying_balance: U256,
        label: Option<&str>,
    ) -> Result<String, MathError> {
        let price = Self::current_price(total_supply, underlying_balance)?;

        let id = match label {
            Some(label) => label.to_string(),
            None => {
                self.sequence += 1;
                format!("snapshot_{}_{}", timestamp, self.sequence)
            }
        };

        self.snapshots
            .insert(id.clone(), PriceSnapshot { timestamp, price });
        Ok(id)
    }

    /// APY between two stored snapshots
    pub fn calculate_apy(&self, start_id: &str, end_id: &str) -> Result<ApyResult, MathError> {
        let start = self.snapshot(start_id)?;
        let end = self.snapshot(end_id)?;
        annualize(start.price, end.price, start.timestamp, end.timestamp)
    }

    /// APY from a stored snapshot to the price implied by fresh reads, now
    pub fn calculate_apy_from_snapshot(
        &self,
        id: &str,
        current_total_supply: U256,
        current_underlying_balance: U256,
    ) -> Result<ApyResult, MathError> {
        self.calculate_apy_from_snapshot_at(
            id,
            current_total_supply,
            current_underlying_balance,
            unix_now(),
        )
    }

    pub fn calculate_apy_from_snapshot_at(
        &self,
        id: &str,
        current_total_supply: U256,
        current_underlying_balance: U256,
        now: u64,
    ) -> Result<ApyResult, MathError> {
        let start = self.snapshot(id)?;
        let current = Self::current_price(current_total_supply, current_underlying_balance)?;
        annualize(start.price, current, start.timestamp, now)
    }

    /// Annualize a single reward event assumed to recur
    /// `distributions_per_year` times
    ///
    /// Only signal available before the pool has any price history.
    pub fn estimate_apy_from_reward(
        reward_amount: U256,
        total_staked: U256,
        distributions_per_year: u64,
    ) -> Result<ApyResult, MathError> {
        if total_staked.is_zero() {
            return Err(MathError::NoStakedAmount);
        }

        let yield_rate = Fixed::divide_integers(reward_amount, total_staked)?;
        let annualized = yield_rate.mul(Fixed::from_integer(distributions_per_year)?)?;
        let apy_basis_points = to_basis_points(annualized)?;

        Ok(ApyResult {
            apy_percent: apy_basis_points as f64 / 100.0,
            apy_basis_points,
            time_period_days: 365.0,
            start_price: None,
            end_price: None,
        })
    }

    pub fn get_snapshot(&self, id: &str) -> Option<&PriceSnapshot> {
        self.snapshots.get(id)
    }

    /// All snapshots, oldest first
    pub fn snapshots(&self) -> Vec<SnapshotInfo> {
        let mut list: Vec<SnapshotInfo> = self
            .snapshots
            .iter()
            .map(|(id, s)| SnapshotInfo {
                id: id.clone(),
                timestamp: s.timestamp,
                price: s.price,
            })
            .collect();
        list.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Id of the oldest snapshot, if any
    pub fn oldest_snapshot_id(&self) -> Option<String> {
        self.snapshots().into_iter().next().map(|s| s.id)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn clear_snapshots(&mut self) {
        self.snapshots.clear();
    }

    fn snapshot(&self, id: &str) -> Result<PriceSnapshot, MathError> {
        self.snapshots
            .get(id)
            .copied()
            .ok_or_else(|| MathError::InvalidSnapshot(id.to_string()))
    }
}

/// Shared formula for both measurement paths
///
/// Windows of a year or longer use the raw return rate; shorter windows are
/// scaled linearly up to a year.
fn annualize(
    start_price: Fixed,
    end_price: Fixed,
    start_ts: u64,
    end_ts: u64,
) -> Result<ApyResult, MathError> {
    if end_ts <= start_ts {
        return Err(MathError::InvalidTimeWindow {
            start: start_ts,
            end: end_ts,
        });
    }
    let elapsed = end_ts - start_ts;

    let return_rate = end_price.sub(start_price)?.div(start_price)?;

    let annualized = if elapsed >= SECONDS_PER_YEAR {
        return_rate
    } else {
        let scaling =
            Fixed::divide_integers(U256::from(SECONDS_PER_YEAR), U256::from(elapsed))?;
        return_rate.mul(scaling)?
    };

    let apy_basis_points = to_basis_points(annualized)?;

    Ok(ApyResult {
        apy_percent: apy_basis_points as f64 / 100.0,
        apy_basis_points,
        time_period_days: elapsed as f64 / SECONDS_PER_DAY as f64,
        start_price: Some(start_price),
        end_price: Some(end_price),
    })
}

fn to_basis_points(rate: Fixed) -> Result<i64, MathError> {
    Ok(rate.mul(Fixed::from_integer(BASIS_POINTS)?)?.to_integer())
}

/// Current wall-clock time in whole seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WAD: u128 = 1_000_000_000_000_000_000;
    const T0: u64 = 1_700_000_000;

    fn wad(n: u128) -> U256 {
        U256::from(n * WAD)
    }

    #[test]
    fn test_current_price_empty_pool_is_one() {
        let price = ApyCalculator::current_price(U256::ZERO, wad(500)).unwrap();
        assert_eq!(price, Fixed::ONE);

        let price = ApyCalculator::current_price(U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(price, Fixed::ONE);
    }

    #[test]
    fn test_current_price_ratio() {
        let price = ApyCalculator::current_price(wad(100), wad(110)).unwrap();
        assert!((price.to_f64() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_one_year_doubling_is_100_percent() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0, wad(100), wad(100), Some("start")).unwrap();
        calc.take_snapshot_at(T0 + SECONDS_PER_YEAR, wad(100), wad(200), Some("end"))
            .unwrap();

        let apy = calc.calculate_apy("start", "end").unwrap();
        assert_eq!(apy.apy_basis_points, 10_000);
        assert_eq!(apy.apy_percent, 100.0);
        assert_eq!(apy.time_period_days, 365.0);
        assert_eq!(apy.start_price, Some(Fixed::ONE));
        assert_eq!(apy.end_price.map(|p| p.to_integer()), Some(2));
    }

    #[test]
    fn test_short_window_scales_linearly() {
        let mut calc = ApyCalculator::new();
        // 1% over 30 days -> ~12.17% a year
        calc.take_snapshot_at(T0, wad(1000), wad(1000), Some("a")).unwrap();
        calc.take_snapshot_at(T0 + 30 * SECONDS_PER_DAY, wad(1000), wad(1010), Some("b"))
            .unwrap();

        let apy = calc.calculate_apy("a", "b").unwrap();
        assert!((apy.apy_percent - 12.16).abs() < 0.02, "got {}", apy.apy_percent);
        assert_eq!(apy.time_period_days, 30.0);
    }

    #[test]
    fn test_long_window_is_not_extrapolated() {
        let mut calc = ApyCalculator::new();
        // 50% over two years stays 50%, not 25% or 100%
        calc.take_snapshot_at(T0, wad(100), wad(100), Some("a")).unwrap();
        calc.take_snapshot_at(T0 + 2 * SECONDS_PER_YEAR, wad(100), wad(150), Some("b"))
            .unwrap();

        let apy = calc.calculate_apy("a", "b").unwrap();
        assert_eq!(apy.apy_basis_points, 5_000);
    }

    #[test]
    fn test_price_drop_gives_negative_apy() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0, wad(100), wad(100), Some("a")).unwrap();
        calc.take_snapshot_at(T0 + SECONDS_PER_YEAR, wad(100), wad(90), Some("b"))
            .unwrap();

        let apy = calc.calculate_apy("a", "b").unwrap();
        assert!(apy.apy_percent < 0.0);
        // 0.9 is not exact in base 2, and negative rates floor away from zero
        assert!((apy.apy_percent + 10.0).abs() < 0.02, "got {}", apy.apy_percent);
    }

    #[test]
    fn test_unknown_snapshot() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0, wad(1), wad(1), Some("a")).unwrap();

        assert_eq!(
            calc.calculate_apy("a", "missing"),
            Err(MathError::InvalidSnapshot("missing".to_string()))
        );
        assert_eq!(
            calc.calculate_apy_from_snapshot_at("nope", wad(1), wad(1), T0 + 10),
            Err(MathError::InvalidSnapshot("nope".to_string()))
        );
    }

    #[test]
    fn test_reversed_or_equal_window() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0 + 100, wad(1), wad(1), Some("late")).unwrap();
        calc.take_snapshot_at(T0, wad(1), wad(2), Some("early")).unwrap();
        calc.take_snapshot_at(T0, wad(1), wad(3), Some("same")).unwrap();

        assert_eq!(
            calc.calculate_apy("late", "early"),
            Err(MathError::InvalidTimeWindow { start: T0 + 100, end: T0 })
        );
        assert_eq!(
            calc.calculate_apy("early", "same"),
            Err(MathError::InvalidTimeWindow { start: T0, end: T0 })
        );
    }

    #[test]
    fn test_apy_from_snapshot_against_live_reads() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0, wad(100), wad(100), Some("initial")).unwrap();

        let apy = calc
            .calculate_apy_from_snapshot_at("initial", wad(100), wad(105), T0 + SECONDS_PER_YEAR)
            .unwrap();
        assert!((apy.apy_percent - 5.0).abs() < 0.02, "got {}", apy.apy_percent);
        assert!((apy.end_price.unwrap().to_f64() - 1.05).abs() < 1e-12);

        assert!(matches!(
            calc.calculate_apy_from_snapshot_at("initial", wad(100), wad(105), T0),
            Err(MathError::InvalidTimeWindow { .. })
        ));
    }

    #[test]
    fn test_estimate_from_monthly_reward() {
        let staked = wad(10_000);
        let reward = wad(100); // 1%

        let apy = ApyCalculator::estimate_apy_from_reward(reward, staked, 12).unwrap();
        assert!((apy.apy_percent - 12.0).abs() < 0.02, "got {}", apy.apy_percent);
        assert_eq!(apy.time_period_days, 365.0);
        assert!(apy.start_price.is_none());
    }

    #[test]
    fn test_estimate_with_nothing_staked() {
        assert_eq!(
            ApyCalculator::estimate_apy_from_reward(wad(1), U256::ZERO, 12),
            Err(MathError::NoStakedAmount)
        );
    }

    #[test]
    fn test_labels_overwrite_and_generated_ids_do_not_collide() {
        let mut calc = ApyCalculator::new();
        let a = calc.take_snapshot_at(T0, wad(1), wad(1), None).unwrap();
        let b = calc.take_snapshot_at(T0, wad(1), wad(1), None).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("snapshot_1700000000_"));

        calc.take_snapshot_at(T0, wad(1), wad(1), Some("x")).unwrap();
        calc.take_snapshot_at(T0 + 5, wad(1), wad(2), Some("x")).unwrap();
        assert_eq!(calc.snapshot_count(), 3);
        assert_eq!(calc.get_snapshot("x").unwrap().timestamp, T0 + 5);
    }

    #[test]
    fn test_listing_and_clearing() {
        let mut calc = ApyCalculator::new();
        calc.take_snapshot_at(T0 + 20, wad(1), wad(1), Some("second")).unwrap();
        calc.take_snapshot_at(T0, wad(1), wad(1), Some("first")).unwrap();

        let ids: Vec<String> = calc.snapshots().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(calc.oldest_snapshot_id().as_deref(), Some("first"));

        calc.clear_snapshots();
        assert_eq!(calc.snapshot_count(), 0);
        assert!(calc.oldest_snapshot_id().is_none());
    }

    proptest! {
        #[test]
        fn prop_price_increase_gives_positive_apy(
            start_balance in 1u128..1_000_000,
            gain_permille in 1u128..1_000,
            elapsed in 60u64..(3 * SECONDS_PER_YEAR),
        ) {
            let supply = wad(1_000_000);
            let start = wad(start_balance);
            // At least 0.1% growth, enough to register in basis points
            let end = start + start * U256::from(gain_permille) / U256::from(1000u32);

            let mut calc = ApyCalculator::new();
            calc.take_snapshot_at(T0, supply, start, Some("s1")).unwrap();
            calc.take_snapshot_at(T0 + elapsed, supply, end, Some("s2")).unwrap();

            let apy = calc.calculate_apy("s1", "s2").unwrap();
            prop_assert!(apy.apy_percent > 0.0);
        }

        #[test]
        fn prop_non_increasing_window_rejected(start in 0u64..1_000_000, back in 0u64..1_000) {
            let mut calc = ApyCalculator::new();
            calc.take_snapshot_at(start + back, wad(1), wad(1), Some("s1")).unwrap();
            calc.take_snapshot_at(start, wad(1), wad(2), Some("s2")).unwrap();

            let is_invalid_window = matches!(
                calc.calculate_apy("s1", "s2"),
                Err(MathError::InvalidTimeWindow { .. })
            );
            prop_assert!(is_invalid_window);
        }
    }
}
