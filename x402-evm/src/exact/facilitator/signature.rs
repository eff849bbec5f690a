//! Signature classification for ERC-3009 payments.
//!
//! Payments can be signed three ways: a plain EOA signature, an EIP-1271
//! contract-wallet signature, or an EIP-6492 wrapped signature from a
//! wallet that is not deployed yet. [`StructuredSignature`] normalizes
//! the raw bytes into one of those shapes so verify/settle can branch on
//! it.

use alloy_primitives::{Address, B256, Bytes, Signature, hex};
use alloy_sol_types::SolType;

use super::contract::Sig6492;

/// The fixed 32-byte magic suffix defined by EIP-6492.
const EIP6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// A structured representation of a payment signature.
#[derive(Debug, Clone)]
pub enum StructuredSignature {
    /// A 64/65-byte signature that recovers to the expected signer.
    Eoa(Signature),
    /// An EIP-6492 wrapped signature from a counterfactual wallet.
    Eip6492 {
        /// Wallet factory to deploy through if the wallet is absent.
        factory: Address,
        /// Calldata for the factory deployment call.
        factory_calldata: Bytes,
        /// The signature the deployed wallet validates.
        inner: Bytes,
        /// The full wrapped bytes, for the universal validator.
        original: Bytes,
    },
    /// Anything else: validated on-chain via EIP-1271.
    Eip1271(Bytes),
}

/// Errors from decoding a wrapped signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureFormatError {
    /// The EIP-6492 wrapper body could not be ABI-decoded.
    #[error("invalid EIP-6492 wrapper: {0}")]
    InvalidEip6492(alloy_sol_types::Error),
}

impl StructuredSignature {
    /// Classifies raw signature bytes.
    ///
    /// A 64/65-byte signature only counts as EOA when it actually
    /// recovers to `expected_signer` over `prehash`; otherwise it is
    /// treated as EIP-1271, since contract wallets may emit 65-byte
    /// signatures too.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureFormatError`] when an EIP-6492 wrapper is
    /// present but malformed.
    pub fn classify(
        bytes: Bytes,
        expected_signer: Address,
        prehash: &B256,
    ) -> Result<Self, SignatureFormatError> {
        let is_eip6492 = bytes.len() >= 32 && bytes[bytes.len() - 32..] == EIP6492_MAGIC_SUFFIX;
        if is_eip6492 {
            let body = &bytes[..bytes.len() - 32];
            let wrapper =
                Sig6492::abi_decode_params(body).map_err(SignatureFormatError::InvalidEip6492)?;
            return Ok(Self::Eip6492 {
                factory: wrapper.factory,
                factory_calldata: wrapper.factoryCalldata,
                inner: wrapper.innerSig,
                original: bytes,
            });
        }

        let eoa = if bytes.len() == 65 {
            Signature::from_raw(&bytes).ok().map(Signature::normalized_s)
        } else if bytes.len() == 64 {
            Some(Signature::from_erc2098(&bytes).normalized_s())
        } else {
            None
        };

        match eoa {
            Some(signature)
                if signature
                    .recover_address_from_prehash(prehash)
                    .is_ok_and(|recovered| recovered == expected_signer) =>
            {
                Ok(Self::Eoa(signature))
            }
            _ => Ok(Self::Eip1271(bytes)),
        }
    }
}
