//! Write-path controllers
//!
//! Approval, staking and unstaking share one pipeline: capability check,
//! connected account, network guard, submission, then confirmation polling.
//! Each controller owns a [`TransactionState`] the UI reads from.

mod approval;
mod staking;
mod unstaking;

pub use approval::ApprovalController;
pub use staking::StakingController;
pub use unstaking::UnstakingController;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, TxHash};
use tokio::time;

use crate::config::StakingConfig;
use crate::error::{classify_provider_error, Operation, StakingError};
use crate::network::NetworkGuard;
use crate::tx_state::TransactionState;
use crate::wallet::{ChainReader, Connector, TransactionRequest, TxReceipt, WalletProvider};

/// Submission pipeline shared by the controllers
#[derive(Clone)]
pub struct TxSubmitter {
    wallet: Arc<dyn WalletProvider>,
    reader: Arc<dyn ChainReader>,
    guard: NetworkGuard,
    confirmation_poll: Duration,
    confirmation_timeout: Duration,
}

impl TxSubmitter {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ChainReader>,
        config: &StakingConfig,
    ) -> Self {
        let guard = NetworkGuard::new(
            wallet.clone(),
            config.chain_id,
            config.switch_settle(),
            config.switch_poll(),
        );

        Self {
            wallet,
            reader,
            guard,
            confirmation_poll: config.confirmation_poll(),
            confirmation_timeout: config.confirmation_timeout(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.guard.target_chain_id()
    }

    pub fn guard(&self) -> &NetworkGuard {
        &self.guard
    }

    /// Fails with `WalletCapability` unless some connector can send contract calls
    pub fn ensure_capable(&self) -> Result<(), StakingError> {
        let connectors = self.wallet.connectors();
        if connectors.iter().any(Connector::supports_contract_calls) {
            Ok(())
        } else {
            log::warn!(
                "No capable connector among {:?}",
                connectors.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
            );
            Err(StakingError::WalletCapability)
        }
    }

    /// Everything a write needs before building the request
    pub async fn prepare(&self) -> Result<Address, StakingError> {
        self.ensure_capable()?;
        let account = self
            .wallet
            .account()
            .ok_or(StakingError::WalletNotConnected)?;
        self.guard.switch_to_target().await?;
        Ok(account)
    }

    /// Run one write through `state`
    ///
    /// `build` gets the connected account once preconditions hold and
    /// returns the request to send. The state ends `Confirmed` or `Failed`.
    pub async fn run<F, Fut>(
        &self,
        op: Operation,
        state: &mut TransactionState,
        build: F,
    ) -> Result<TxReceipt, StakingError>
    where
        F: FnOnce(Address) -> Fut,
        Fut: Future<Output = Result<TransactionRequest, StakingError>>,
    {
        state.begin();

        let outcome = async {
            let account = self.prepare().await?;
            let request = build(account).await?;
            let hash = self.send(op, request).await?;
            state.submitted(hash);
            self.wait_for_confirmation(hash).await
        }
        .await;

        match outcome {
            Ok(receipt) => {
                log::info!(
                    "{} confirmed: {} in block {}",
                    op,
                    receipt.hash,
                    receipt.block_number
                );
                state.confirmed();
                Ok(receipt)
            }
            Err(e) => {
                log::error!("{} failed: {}", op, e);
                state.failed(e.clone());
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        op: Operation,
        request: TransactionRequest,
    ) -> Result<TxHash, StakingError> {
        log::debug!(
            "Submitting {} to {} on chain {}",
            op,
            request.to,
            request.chain_id
        );

        let hash = self
            .wallet
            .send_transaction(request)
            .await
            .map_err(|e| {
                let classified = classify_provider_error(&e, op);
                log::warn!("{} submission failed: {} ({:?})", op, e, classified);
                classified
            })?;

        log::info!("{} submitted: {}", op, hash);
        Ok(hash)
    }

    /// Poll for the receipt until mined or the timeout elapses
    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<TxReceipt, StakingError> {
        let poll = async {
            // interval() rejects a zero period
            let period = self.confirmation_poll.max(Duration::from_millis(1));
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                match self.reader.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => log::debug!("Waiting for {}", hash),
                    // Transient; keep polling until the deadline
                    Err(e) => log::warn!("Receipt lookup for {} failed: {}", hash, e),
                }
            }
        };

        let receipt = time::timeout(self.confirmation_timeout, poll)
            .await
            .map_err(|_| StakingError::ConfirmationTimeout(hash))?;

        if receipt.success {
            Ok(receipt)
        } else {
            Err(StakingError::TransactionReverted(hash))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::sim::SimulatedChain;

    /// Simulated chain plus a config with millisecond timings
    pub fn setup() -> (Arc<SimulatedChain>, StakingConfig) {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut config = StakingConfig::default_polygon();
        config.switch_settle_ms = 100;
        config.switch_poll_ms = 5;
        config.confirmation_poll_ms = 5;
        config.confirmation_timeout_secs = 1;

        let sim = Arc::new(SimulatedChain::with_config(&config));
        (sim, config)
    }

    pub fn submitter(sim: &Arc<SimulatedChain>, config: &StakingConfig) -> TxSubmitter {
        TxSubmitter::new(sim.clone(), sim.clone(), config)
    }
}
