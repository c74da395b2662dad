//! Wallet and chain collaborators
//!
//! The client never talks to a wallet or an RPC node directly. UI code hands
//! it a [`WalletProvider`] (account, chain, signing) and a [`ChainReader`]
//! (calls and receipts against the target chain).

use std::fmt;

use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// EIP-1193 provider error codes
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
}

/// Raw failure reported by a wallet or RPC node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    /// Structured code when the provider supplies one
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Error with only a message to go on
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Wallet connector known to the wallet layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub id: String,
    pub name: String,
    /// Whether the connector can sign arbitrary contract calls, when the
    /// wallet layer says so
    pub contract_calls: Option<bool>,
}

impl Connector {
    /// Connector that explicitly supports contract calls
    pub fn capable(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            contract_calls: Some(true),
        }
    }

    /// Connector that explicitly cannot send contract calls
    pub fn read_only(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            contract_calls: Some(false),
        }
    }

    /// Explicit capability first, otherwise guess from the connector name
    pub fn supports_contract_calls(&self) -> bool {
        if let Some(capable) = self.contract_calls {
            return capable;
        }
        let name = self.name.to_lowercase();
        ["coinbase", "metamask", "wallet"]
            .iter()
            .any(|known| name.contains(known))
    }
}

/// Transaction handed to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub chain_id: u64,
    pub gas: u64,
}

/// Mined transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
    /// false when the transaction reverted
    pub success: bool,
}

/// Connected wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connected account, None when disconnected
    fn account(&self) -> Option<Address>;

    /// Chain the wallet currently targets, None when disconnected
    fn chain_id(&self) -> Option<u64>;

    /// Connectors available to the wallet layer
    fn connectors(&self) -> Vec<Connector>;

    /// Whether `switch_chain` resolving means the switch is already
    /// observable through `chain_id`
    fn reports_chain_switch(&self) -> bool {
        false
    }

    /// Ask the wallet to move to `chain_id`
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    /// Sign and broadcast, returning the transaction hash
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError>;
}

/// Read access to the target chain
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against `to` at the latest block
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ProviderError>;

    /// Receipt for `hash`, None while still pending
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, ProviderError>;
}
