//! In-memory simulated chain
//!
//! Implements both [`WalletProvider`] and [`ChainReader`] over a tiny ledger
//! holding the two contracts, so flows can run end to end without a node.
//! Failure knobs cover what real wallets do to us: refusals, missing gas,
//! reverts, slow switches and slow mining.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use crate::config::StakingConfig;
use crate::contracts::{IStakedToken, IERC20, MAX_APPROVAL};
use crate::reads::PoolState;
use crate::wallet::{
    codes, ChainReader, Connector, ProviderError, TransactionRequest, TxReceipt, WalletProvider,
};

/// Token balances for both contracts
#[derive(Debug, Clone, Default)]
struct Ledger {
    underlying: HashMap<Address, U256>,
    staked: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    underlying_supply: U256,
    staked_supply: U256,
}

impl Ledger {
    fn underlying_of(&self, owner: &Address) -> U256 {
        self.underlying.get(owner).copied().unwrap_or_default()
    }

    fn staked_of(&self, owner: &Address) -> U256 {
        self.staked.get(owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn pool(&self, staking: &Address) -> PoolState {
        PoolState {
            total_supply: self.staked_supply,
            underlying_balance: self.underlying_of(staking),
        }
    }

    fn move_underlying(&mut self, from: Address, to: Address, amount: U256) -> Result<(), String> {
        let balance = self.underlying_of(&from);
        if balance < amount {
            return Err("execution reverted: ERC20: transfer amount exceeds balance".into());
        }
        self.underlying.insert(from, balance - amount);
        *self.underlying.entry(to).or_default() += amount;
        Ok(())
    }

    /// Apply one contract call from `from`
    fn execute(
        &mut self,
        contracts: &Contracts,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<(), String> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| "execution reverted".to_string())?;

        if to == contracts.underlying && selector == IERC20::approveCall::SELECTOR {
            let call = IERC20::approveCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            self.allowances.insert((from, call.spender), call.amount);
            return Ok(());
        }

        if to == contracts.staked && selector == IStakedToken::stakeCall::SELECTOR {
            let call = IStakedToken::stakeCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            let allowance = self.allowance(from, contracts.staked);
            if allowance < call.amount {
                return Err("execution reverted: ERC20: insufficient allowance".into());
            }

            let shares = self.pool(&contracts.staked).shares_for(call.amount);
            self.move_underlying(from, contracts.staked, call.amount)?;
            if allowance != MAX_APPROVAL {
                self.allowances
                    .insert((from, contracts.staked), allowance - call.amount);
            }
            *self.staked.entry(call.beneficiary).or_default() += shares;
            self.staked_supply += shares;
            return Ok(());
        }

        if to == contracts.staked && selector == IStakedToken::unstakeCall::SELECTOR {
            let call =
                IStakedToken::unstakeCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            if call.from != from {
                return Err("execution reverted: caller is not owner".into());
            }
            let shares = self.staked_of(&call.from);
            if shares < call.amount {
                return Err("execution reverted: burn amount exceeds balance".into());
            }

            let payout = self.pool(&contracts.staked).underlying_for(call.amount);
            self.staked.insert(call.from, shares - call.amount);
            self.staked_supply -= call.amount;
            self.move_underlying(contracts.staked, call.to, payout)?;
            return Ok(());
        }

        Err("execution reverted".into())
    }
}

#[derive(Debug, Clone, Copy)]
struct Contracts {
    underlying: Address,
    staked: Address,
}

#[derive(Debug)]
struct PendingTx {
    from: Address,
    request: TransactionRequest,
    polls_remaining: u32,
    force_revert: bool,
}

#[derive(Debug)]
struct SimState {
    ledger: Ledger,
    wallet_chain: Option<u64>,
    account: Option<Address>,
    connectors: Vec<Connector>,
    /// (target chain, chain id reads left before it shows)
    pending_switch: Option<(u64, u32)>,
    switch_lag: u32,
    switch_requests: u32,
    switch_failure: Option<ProviderError>,
    reports_switch: bool,
    send_failures: VecDeque<ProviderError>,
    revert_next: bool,
    read_failure: bool,
    gas_funds: bool,
    mining_delay: u32,
    nonce: u64,
    block: u64,
    pending: HashMap<TxHash, PendingTx>,
    mined: HashMap<TxHash, TxReceipt>,
    sent: Vec<TransactionRequest>,
}

pub struct SimulatedChain {
    chain_id: u64,
    contracts: Contracts,
    state: Mutex<SimState>,
}

impl SimulatedChain {
    /// Default deployment on `chain_id`, wallet connected and on that chain
    pub fn new(chain_id: u64) -> Self {
        let mut config = StakingConfig::default_polygon();
        config.chain_id = chain_id;
        Self::with_config(&config)
    }

    pub fn with_config(config: &StakingConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            contracts: Contracts {
                underlying: config.underlying.address,
                staked: config.staked.address,
            },
            state: Mutex::new(SimState {
                ledger: Ledger::default(),
                wallet_chain: Some(config.chain_id),
                account: Some(Address::repeat_byte(0xaa)),
                connectors: vec![Connector::capable("injected", "MetaMask")],
                pending_switch: None,
                switch_lag: 0,
                switch_requests: 0,
                switch_failure: None,
                reports_switch: false,
                send_failures: VecDeque::new(),
                revert_next: false,
                read_failure: false,
                gas_funds: true,
                mining_delay: 0,
                nonce: 0,
                block: 1,
                pending: HashMap::new(),
                mined: HashMap::new(),
                sent: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_account(&self, account: Option<Address>) {
        self.lock().account = account;
    }

    pub fn set_wallet_chain(&self, chain_id: Option<u64>) {
        let mut state = self.lock();
        state.wallet_chain = chain_id;
        state.pending_switch = None;
    }

    pub fn set_connectors(&self, connectors: Vec<Connector>) {
        self.lock().connectors = connectors;
    }

    /// After a switch, report the old chain for this many more reads
    pub fn set_switch_lag(&self, reads: u32) {
        self.lock().switch_lag = reads;
    }

    pub fn set_reports_chain_switch(&self, reports: bool) {
        self.lock().reports_switch = reports;
    }

    pub fn fail_next_switch(&self, err: ProviderError) {
        self.lock().switch_failure = Some(err);
    }

    /// Queue a failure for the next `send_transaction`
    pub fn fail_next_send(&self, err: ProviderError) {
        self.lock().send_failures.push_back(err);
    }

    /// Accept the next transaction but mine it as reverted
    pub fn revert_next(&self) {
        self.lock().revert_next = true;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().read_failure = fail;
    }

    pub fn set_gas_funds(&self, funded: bool) {
        self.lock().gas_funds = funded;
    }

    /// Receipt polls answered with "pending" before a transaction is mined
    pub fn set_mining_delay(&self, polls: u32) {
        self.lock().mining_delay = polls;
    }

    pub fn mint_underlying(&self, to: Address, amount: U256) {
        let mut state = self.lock();
        *state.ledger.underlying.entry(to).or_default() += amount;
        state.ledger.underlying_supply += amount;
    }

    /// Reward distribution: new BRLA lands in the pool, raising the price
    pub fn accrue_rewards(&self, amount: U256) {
        let staked = self.contracts.staked;
        self.mint_underlying(staked, amount);
    }

    pub fn underlying_balance(&self, owner: Address) -> U256 {
        self.lock().ledger.underlying_of(&owner)
    }

    pub fn staked_balance(&self, owner: Address) -> U256 {
        self.lock().ledger.staked_of(&owner)
    }

    pub fn allowance(&self, owner: Address) -> U256 {
        self.lock().ledger.allowance(owner, self.contracts.staked)
    }

    pub fn pool(&self) -> PoolState {
        self.lock().ledger.pool(&self.contracts.staked)
    }

    pub fn switch_requests(&self) -> u32 {
        self.lock().switch_requests
    }

    /// Every request the wallet accepted, in order
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.lock().sent.clone()
    }

    fn mine(&self, state: &mut SimState, hash: TxHash, tx: PendingTx) -> TxReceipt {
        state.block += 1;
        let outcome = if tx.force_revert {
            Err("forced revert".to_string())
        } else {
            state
                .ledger
                .execute(&self.contracts, tx.from, tx.request.to, &tx.request.data)
        };

        if let Err(reason) = &outcome {
            log::debug!("Simulated tx {} reverted: {}", hash, reason);
        }

        let receipt = TxReceipt {
            hash,
            block_number: state.block,
            success: outcome.is_ok(),
        };
        state.mined.insert(hash, receipt);
        receipt
    }
}

fn encode_word(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

/// Sign-extended int128 return word
fn encode_signed_word(value: i128) -> Bytes {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = vec![fill; 16];
    word.extend_from_slice(&value.to_be_bytes());
    Bytes::from(word)
}

fn decode_arg<C: SolCall>(data: &[u8]) -> Result<C, ProviderError> {
    C::abi_decode(data, true).map_err(|e| ProviderError::message(e.to_string()))
}

#[async_trait]
impl WalletProvider for SimulatedChain {
    fn account(&self) -> Option<Address> {
        self.lock().account
    }

    fn chain_id(&self) -> Option<u64> {
        let mut state = self.lock();
        if let Some((target, remaining)) = state.pending_switch {
            if remaining == 0 {
                state.wallet_chain = Some(target);
                state.pending_switch = None;
            } else {
                state.pending_switch = Some((target, remaining - 1));
            }
        }
        state.wallet_chain
    }

    fn connectors(&self) -> Vec<Connector> {
        self.lock().connectors.clone()
    }

    fn reports_chain_switch(&self) -> bool {
        self.lock().reports_switch
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.switch_requests += 1;

        if let Some(err) = state.switch_failure.take() {
            return Err(err);
        }
        if chain_id != self.chain_id {
            return Err(ProviderError::new(
                codes::UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID {}", chain_id),
            ));
        }

        if state.switch_lag == 0 || state.reports_switch {
            state.wallet_chain = Some(chain_id);
        } else {
            let lag = state.switch_lag;
            state.pending_switch = Some((chain_id, lag));
        }
        Ok(())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError> {
        let mut state = self.lock();

        let from = state
            .account
            .ok_or_else(|| ProviderError::new(codes::UNAUTHORIZED, "No account connected"))?;
        if state.wallet_chain != Some(request.chain_id) {
            return Err(ProviderError::message(format!(
                "The current chain of the wallet (id: {:?}) does not match \
                 the target chain for the transaction (id: {})",
                state.wallet_chain, request.chain_id
            )));
        }
        if let Some(err) = state.send_failures.pop_front() {
            return Err(err);
        }
        if !state.gas_funds {
            return Err(ProviderError::new(
                -32000,
                "insufficient funds for gas * price + value",
            ));
        }

        // Gas estimation: run against a scratch copy
        let mut scratch = state.ledger.clone();
        scratch
            .execute(&self.contracts, from, request.to, &request.data)
            .map_err(|reason| ProviderError::new(-32000, reason))?;

        state.nonce += 1;
        let hash = keccak256(state.nonce.to_be_bytes());
        let force_revert = std::mem::take(&mut state.revert_next);
        let polls_remaining = state.mining_delay;

        state.sent.push(request.clone());
        state.pending.insert(
            hash,
            PendingTx {
                from,
                request,
                polls_remaining,
                force_revert,
            },
        );
        Ok(hash)
    }
}

#[async_trait]
impl ChainReader for SimulatedChain {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ProviderError> {
        let state = self.lock();
        if state.read_failure {
            return Err(ProviderError::message("network timeout"));
        }

        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ProviderError::message("execution reverted"))?;
        let ledger = &state.ledger;

        if to == self.contracts.staked && selector == IStakedToken::_currentPriceCall::SELECTOR {
            let pool = ledger.pool(&self.contracts.staked);
            let price = pool
                .exchange_rate()
                .map_err(|e| ProviderError::message(format!("execution reverted: {}", e)))?;
            return Ok(encode_signed_word(price.raw()));
        }

        let value = if to == self.contracts.underlying {
            if selector == IERC20::balanceOfCall::SELECTOR {
                let call = decode_arg::<IERC20::balanceOfCall>(&input)?;
                ledger.underlying_of(&call.owner)
            } else if selector == IERC20::allowanceCall::SELECTOR {
                let call = decode_arg::<IERC20::allowanceCall>(&input)?;
                ledger.allowance(call.owner, call.spender)
            } else if selector == IERC20::totalSupplyCall::SELECTOR {
                ledger.underlying_supply
            } else {
                return Err(ProviderError::message("execution reverted"));
            }
        } else if to == self.contracts.staked {
            if selector == IStakedToken::balanceOfCall::SELECTOR {
                let call = decode_arg::<IStakedToken::balanceOfCall>(&input)?;
                ledger.staked_of(&call.owner)
            } else if selector == IStakedToken::totalSupplyCall::SELECTOR {
                ledger.staked_supply
            } else {
                return Err(ProviderError::message("execution reverted"));
            }
        } else {
            return Err(ProviderError::message("execution reverted: no code at address"));
        };

        Ok(encode_word(value))
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, ProviderError> {
        let mut state = self.lock();
        if let Some(receipt) = state.mined.get(&hash) {
            return Ok(Some(*receipt));
        }

        let Some(mut tx) = state.pending.remove(&hash) else {
            return Ok(None);
        };
        if tx.polls_remaining > 0 {
            tx.polls_remaining -= 1;
            state.pending.insert(hash, tx);
            return Ok(None);
        }

        Ok(Some(self.mine(&mut state, hash, tx)))
    }
}
