//! Wire types for the EVM `exact` scheme.
//!
//! The payload is an EIP-3009 `TransferWithAuthorization`: the structured
//! authorization the client signed, plus the signature itself. The
//! signature can be an EOA signature (65 bytes), an EIP-1271 contract
//! signature, or an EIP-6492 wrapped signature from a not-yet-deployed
//! smart wallet.

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};
use x402::proto::UnixTimestamp;

use crate::chain::TokenAmount;

/// The structured data of an ERC-3009 transfer authorization.
///
/// Field values here MUST match the EIP-712 message that was signed; the
/// facilitator reconstructs the typed data from this struct to verify the
/// signature.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// The token owner authorizing the transfer.
    pub from: Address,
    /// The transfer recipient.
    pub to: Address,
    /// The amount to transfer, in the token's atomic units.
    pub value: TokenAmount,
    /// Authorization is invalid before this time (inclusive).
    pub valid_after: UnixTimestamp,
    /// Authorization expires at this time (exclusive).
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce; burned on-chain at settlement.
    pub nonce: B256,
}

/// The EVM exact payment payload: authorization plus signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Payload {
    /// The EIP-712 signature over the authorization, `0x`-prefixed hex.
    pub signature: Bytes,
    /// The authorization data that was signed.
    pub authorization: Eip3009Authorization,
}

/// `extra` data of EVM payment requirements: the EIP-712 domain fields of
/// the token contract.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip155Extra {
    /// The token name as used in the EIP-712 domain.
    pub name: String,
    /// The token version as used in the EIP-712 domain.
    pub version: String,
    /// Split recipients; present only for the `split` scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<x402::split::SplitRecipient>>,
}

sol!(
    /// EIP-712 struct for ERC-3009 `transferWithAuthorization`.
    ///
    /// The type string hashed into the signature is
    /// `TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)`.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Typed views of the protocol wire types for this mechanism.
pub mod v2 {
    use x402::proto::v2 as proto_v2;

    use super::Eip155Extra;
    use crate::chain::TokenAmount;
    use alloy_primitives::Address;

    /// Payment requirements narrowed to EVM types.
    pub type PaymentRequirements =
        proto_v2::PaymentRequirements<String, TokenAmount, Address, Eip155Extra>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address, b256};

    #[test]
    fn payload_json_round_trip() {
        let payload = Eip3009Payload {
            signature: Bytes::from(vec![0x11; 65]),
            authorization: Eip3009Authorization {
                from: address!("0x0000000000000000000000000000000000000001"),
                to: address!("0x0000000000000000000000000000000000000002"),
                value: TokenAmount(U256::from(1000u64)),
                valid_after: UnixTimestamp::from_secs(0),
                valid_before: UnixTimestamp::from_secs(600),
                nonce: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["authorization"]["value"], "1000");
        assert_eq!(json["authorization"]["validBefore"], "600");
        let back: Eip3009Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back.authorization.value, payload.authorization.value);
        assert_eq!(back.signature, payload.signature);
    }
}
