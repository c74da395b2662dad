//! Contract bindings and call builders for BRLA / stBRLA

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use crate::wallet::TransactionRequest;

/// "Infinite" approval amount: max uint256
pub const MAX_APPROVAL: U256 = U256::MAX;

sol! {
    /// Underlying asset (BRLA)
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function totalSupply() external view returns (uint256);
    }

    /// Staking contract, which is also the stBRLA token
    interface IStakedToken {
        function balanceOf(address owner) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        /// Share price as signed 64.64 fixed point
        function _currentPrice() external view returns (int128);
        function stake(address beneficiary, uint256 amount) external;
        function unstake(address from, address to, uint256 amount) external;
    }
}

/// Build `approve(spender, amount)` against the underlying token
pub fn build_approve_request(
    token: Address,
    spender: Address,
    amount: U256,
    chain_id: u64,
    gas: u64,
) -> TransactionRequest {
    let data = IERC20::approveCall { spender, amount }.abi_encode();

    TransactionRequest {
        to: token,
        data: Bytes::from(data),
        chain_id,
        gas,
    }
}

/// Build `stake(beneficiary, amount)` against the staking contract
pub fn build_stake_request(
    staking: Address,
    beneficiary: Address,
    amount: U256,
    chain_id: u64,
    gas: u64,
) -> TransactionRequest {
    let data = IStakedToken::stakeCall {
        beneficiary,
        amount,
    }
    .abi_encode();

    TransactionRequest {
        to: staking,
        data: Bytes::from(data),
        chain_id,
        gas,
    }
}

/// Build `unstake(from, to, amount)` against the staking contract
///
/// Shares are always burned from and paid out to the same account.
pub fn build_unstake_request(
    staking: Address,
    account: Address,
    amount: U256,
    chain_id: u64,
    gas: u64,
) -> TransactionRequest {
    let data = IStakedToken::unstakeCall {
        from: account,
        to: account,
        amount,
    }
    .abi_encode();

    TransactionRequest {
        to: staking,
        data: Bytes::from(data),
        chain_id,
        gas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_build_approve_request() {
        let req = build_approve_request(addr(1), addr(2), MAX_APPROVAL, 137, 100_000);

        assert_eq!(req.to, addr(1));
        assert_eq!(req.chain_id, 137);
        assert_eq!(req.gas, 100_000);
        assert_eq!(&req.data[..4], &IERC20::approveCall::SELECTOR[..]);
        // selector + two words
        assert_eq!(req.data.len(), 4 + 64);

        let decoded = IERC20::approveCall::abi_decode(&req.data, true).unwrap();
        assert_eq!(decoded.spender, addr(2));
        assert_eq!(decoded.amount, U256::MAX);
    }

    #[test]
    fn test_build_stake_request() {
        let req = build_stake_request(addr(3), addr(4), U256::from(100u64), 137, 200_000);

        assert_eq!(req.to, addr(3));
        let decoded = IStakedToken::stakeCall::abi_decode(&req.data, true).unwrap();
        assert_eq!(decoded.beneficiary, addr(4));
        assert_eq!(decoded.amount, U256::from(100u64));
    }

    #[test]
    fn test_build_unstake_request_uses_same_account() {
        let req = build_unstake_request(addr(3), addr(5), U256::from(7u64), 137, 200_000);

        let decoded = IStakedToken::unstakeCall::abi_decode(&req.data, true).unwrap();
        assert_eq!(decoded.from, addr(5));
        assert_eq!(decoded.to, addr(5));
        assert_eq!(decoded.amount, U256::from(7u64));
    }
}
