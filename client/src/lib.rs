//! RendeX staking client
//!
//! Stakes BRLA for stBRLA and back on the one supported chain. The UI supplies
//! a wallet and a chain reader; this crate owns the read layer, the network
//! guard, the approve/stake/unstake controllers, the modal flows and the live
//! APY feed.

pub mod apy_feed;
pub mod client;
pub mod config;
pub mod contracts;
pub mod controller;
pub mod error;
pub mod flow;
pub mod network;
pub mod reads;
pub mod sim;
pub mod tx_state;
pub mod units;
pub mod wallet;

pub use apy_feed::{ApyEstimate, ApyFeed};
pub use client::StakingClient;
pub use config::{StakingConfig, TokenConfig};
pub use controller::{ApprovalController, StakingController, TxSubmitter, UnstakingController};
pub use error::{classify_provider_error, Operation, StakingError};
pub use flow::{FlowError, FlowSummary, StakingFlow, StakingStep, UnstakingFlow, UnstakingStep};
pub use network::NetworkGuard;
pub use reads::{AccountBalances, ContractReads, PoolState};
pub use sim::SimulatedChain;
pub use tx_state::{TransactionState, TxPhase};
pub use wallet::{
    ChainReader, Connector, ProviderError, TransactionRequest, TxReceipt, WalletProvider,
};
