//! Entry point wiring collaborators and config into controllers and flows

use std::sync::Arc;

use anyhow::Result;

use crate::apy_feed::ApyFeed;
use crate::config::StakingConfig;
use crate::controller::{ApprovalController, StakingController, TxSubmitter, UnstakingController};
use crate::flow::{StakingFlow, UnstakingFlow};
use crate::network::NetworkGuard;
use crate::reads::ContractReads;
use crate::wallet::{ChainReader, WalletProvider};

#[derive(Clone)]
pub struct StakingClient {
    config: StakingConfig,
    wallet: Arc<dyn WalletProvider>,
    reader: Arc<dyn ChainReader>,
}

impl StakingClient {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ChainReader>,
        config: StakingConfig,
    ) -> Self {
        log::info!(
            "Staking client on chain {}: {} {} / {} {}",
            config.chain_id,
            config.underlying.symbol,
            config.underlying.address,
            config.staked.symbol,
            config.staked.address
        );
        Self {
            config,
            wallet,
            reader,
        }
    }

    /// Build from the config file, falling back to the Polygon deployment
    pub fn from_env(wallet: Arc<dyn WalletProvider>, reader: Arc<dyn ChainReader>) -> Self {
        let config = StakingConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({:#}), using Polygon defaults", e);
            StakingConfig::default_polygon()
        });
        Self::new(wallet, reader, config)
    }

    /// Build from an explicit config file
    pub fn from_file(
        path: &str,
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ChainReader>,
    ) -> Result<Self> {
        let config = StakingConfig::load_from(path)?;
        Ok(Self::new(wallet, reader, config))
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    pub fn reads(&self) -> ContractReads {
        ContractReads::new(self.reader.clone(), self.wallet.clone(), &self.config)
    }

    pub fn network_guard(&self) -> NetworkGuard {
        NetworkGuard::new(
            self.wallet.clone(),
            self.config.chain_id,
            self.config.switch_settle(),
            self.config.switch_poll(),
        )
    }

    fn submitter(&self) -> TxSubmitter {
        TxSubmitter::new(self.wallet.clone(), self.reader.clone(), &self.config)
    }

    pub fn approval(&self) -> ApprovalController {
        ApprovalController::new(self.submitter(), &self.config)
    }

    pub fn staking(&self) -> StakingController {
        StakingController::new(self.submitter(), &self.config)
    }

    pub fn unstaking(&self) -> UnstakingController {
        UnstakingController::new(self.submitter(), self.reads(), &self.config)
    }

    pub fn staking_flow(&self) -> StakingFlow {
        StakingFlow::new(self.submitter(), self.reads(), &self.config)
    }

    pub fn unstaking_flow(&self) -> UnstakingFlow {
        UnstakingFlow::new(self.submitter(), self.reads(), &self.config)
    }

    pub fn apy_feed(&self) -> ApyFeed {
        ApyFeed::new(self.reads())
    }
}
