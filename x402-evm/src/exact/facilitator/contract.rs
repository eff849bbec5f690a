//! Solidity interface definitions for on-chain interactions.
//!
//! Minimal ABI surface:
//! - [`IEIP3009`] - ERC-3009 subset of USDC-style tokens. Overload order
//!   matters: the bytes-signature variant is `_0`, the (v,r,s) variant is
//!   `_1`.
//! - [`Validator6492`] - the EIP-6492 universal signature validator.
//! - [`Sig6492`] - ABI-decodable prefix of an EIP-6492 wrapped signature.

use alloy_primitives::{Address, address};
use alloy_sol_types::sol;

/// The universal signature validator deployment (same address on all
/// chains via CREATE2).
pub const VALIDATOR_ADDRESS: Address = address!("0x164af34fAF9879394370C7f09064127C043A35E9");

sol! {
    /// Minimal ERC-3009 interface for USDC-style tokens.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IEIP3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

sol! {
    /// EIP-6492 universal signature validator interface.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface Validator6492 {
        function isValidSig(address signer, bytes32 hash, bytes calldata signature) external returns (bool);
        error ERC1271Revert(bytes error);
        error ERC6492DeployFailed(bytes error);
    }
}

sol! {
    /// ABI layout of the body of an EIP-6492 wrapped signature
    /// (everything before the 32-byte magic suffix).
    #[derive(Debug)]
    struct Sig6492 {
        address factory;
        bytes   factoryCalldata;
        bytes   innerSig;
    }
}

sol! {
    /// [`Multicall3`](https://github.com/mds1/multicall) interface,
    /// deployed at the same address on all chains via CREATE2.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}
