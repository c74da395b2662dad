//! Network guard: keep writes on the one supported chain

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::error::StakingError;
use crate::wallet::WalletProvider;

#[derive(Clone)]
pub struct NetworkGuard {
    wallet: Arc<dyn WalletProvider>,
    target_chain_id: u64,
    settle: Duration,
    poll: Duration,
}

impl NetworkGuard {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        target_chain_id: u64,
        settle: Duration,
        poll: Duration,
    ) -> Self {
        Self {
            wallet,
            target_chain_id,
            settle,
            poll,
        }
    }

    pub fn target_chain_id(&self) -> u64 {
        self.target_chain_id
    }

    pub fn is_on_target_chain(&self) -> bool {
        self.wallet.chain_id() == Some(self.target_chain_id)
    }

    /// Connected, but to some other chain
    pub fn needs_switch(&self) -> bool {
        matches!(self.wallet.chain_id(), Some(id) if id != self.target_chain_id)
    }

    /// Move the wallet to the target chain; no-op when already there
    ///
    /// Wallets do not always reflect a switch by the time the request
    /// resolves, so after a switch the chain id is re-read every `poll` for
    /// at most `settle` before returning.
    pub async fn switch_to_target(&self) -> Result<(), StakingError> {
        if self.is_on_target_chain() {
            return Ok(());
        }

        log::info!(
            "Switching wallet from chain {:?} to {}",
            self.wallet.chain_id(),
            self.target_chain_id
        );

        self.wallet
            .switch_chain(self.target_chain_id)
            .await
            .map_err(|e| {
                log::warn!("Chain switch to {} failed: {}", self.target_chain_id, e);
                StakingError::NetworkSwitchFailed {
                    chain_id: self.target_chain_id,
                    reason: e.message,
                }
            })?;

        if self.wallet.reports_chain_switch() {
            return Ok(());
        }

        self.wait_for_settle().await;
        Ok(())
    }

    async fn wait_for_settle(&self) {
        let deadline = Instant::now() + self.settle;

        while !self.is_on_target_chain() {
            if Instant::now() >= deadline {
                // The request carries the chain id, so the wallet still
                // refuses a mismatched submission
                log::warn!(
                    "Chain {} not observed after {:?}, continuing",
                    self.target_chain_id,
                    self.settle
                );
                return;
            }
            time::sleep(self.poll.min(deadline.saturating_duration_since(Instant::now()))).await;
        }

        log::debug!("Wallet on chain {}", self.target_chain_id);
    }
}
