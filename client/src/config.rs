//! Staking client configuration

use std::time::Duration;

use alloy_primitives::{address, Address};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Polygon PoS mainnet
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "RENDEX_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "rendex.toml";

const BRLA_ADDRESS: Address = address!("e6a537a407488807f0bbeb0038b79004f19dddfb");
const STAKED_BRLA_ADDRESS: Address = address!("2305256fb0a361a4751f6c9a490768f24cccbba0");

/// One ERC-20-like token deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// RPC URL for the target chain
    pub rpc_url: String,

    /// The one chain both contracts live on
    pub chain_id: u64,

    /// Underlying asset (BRLA)
    pub underlying: TokenConfig,

    /// Staked asset and staking contract (stBRLA)
    pub staked: TokenConfig,

    /// Gas limits per call
    pub approve_gas: u64,
    pub stake_gas: u64,
    pub unstake_gas: u64,

    /// Longest wait for a requested chain switch to become observable
    pub switch_settle_ms: u64,

    /// Chain id re-check interval while settling
    pub switch_poll_ms: u64,

    /// Receipt polling interval
    pub confirmation_poll_ms: u64,

    /// Give up waiting for a receipt after this long
    pub confirmation_timeout_secs: u64,
}

impl StakingConfig {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path (`~` is expanded)
    pub fn load_from(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);

        let config_str = std::fs::read_to_string(expanded_path.as_ref())
            .context(format!("Failed to read config file: {}", path))?;

        let config: StakingConfig =
            toml::from_str(&config_str).context("Failed to parse config TOML")?;

        log::debug!("Loaded staking config from {}", path);
        Ok(config)
    }

    /// BRLA / stBRLA on Polygon
    pub fn default_polygon() -> Self {
        Self {
            rpc_url: "https://polygon-rpc.com".to_string(),
            chain_id: POLYGON_CHAIN_ID,
            underlying: TokenConfig {
                address: BRLA_ADDRESS,
                decimals: 18,
                symbol: "BRLA".to_string(),
            },
            staked: TokenConfig {
                address: STAKED_BRLA_ADDRESS,
                decimals: 18,
                symbol: "stBRLA".to_string(),
            },
            approve_gas: 100_000,
            stake_gas: 200_000,
            unstake_gas: 200_000,
            switch_settle_ms: 1_500,
            switch_poll_ms: 100,
            confirmation_poll_ms: 1_000,
            confirmation_timeout_secs: 120,
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_polygon();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        let expanded_path = shellexpand::tilde(path);
        std::fs::write(expanded_path.as_ref(), toml_str)
            .context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }

    pub fn switch_poll(&self) -> Duration {
        Duration::from_millis(self.switch_poll_ms)
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self::default_polygon()
    }
}
