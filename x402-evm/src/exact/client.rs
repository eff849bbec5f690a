//! Client-side signing for the EVM schemes.
//!
//! Builds and signs ERC-3009 `transferWithAuthorization` messages with
//! EIP-712. The `split` scheme signs the identical message shape (the
//! whole amount goes to the escrow), so [`sign_erc3009_authorization`] is
//! shared and [`Eip155Client`] serves whichever scheme name it is
//! constructed for.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain};
use async_trait::async_trait;
use rand::Rng;
use x402::proto::UnixTimestamp;
use x402::proto::v2::{PaymentPayload, PaymentRequirements, V2};
use x402::scheme::{ClientError, EXACT_SCHEME, SPLIT_SCHEME, SchemeClient};

use crate::chain::Eip155ChainReference;
use crate::exact::types::{self, Eip3009Authorization, Eip3009Payload, TransferWithAuthorization};

/// How far in the past `validAfter` is set, so the authorization is
/// immediately valid despite clock drift between signer and chain.
const VALID_AFTER_SKEW_SECONDS: u64 = 10;

/// Abstracts signing so both owned signers and `Arc`-shared signers work.
///
/// Alloy's `Signer` trait is not implemented for `Arc<T>`, but callers
/// routinely share one `PrivateKeySigner` across mechanisms.
pub trait SignerLike: Send + Sync {
    /// The signer's address.
    fn address(&self) -> Address;

    /// Signs a 32-byte hash.
    fn sign_hash(
        &self,
        hash: &FixedBytes<32>,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// Signs an ERC-3009 `TransferWithAuthorization` with EIP-712.
///
/// The domain is `{name, version, chainId, verifyingContract: asset}`
/// with `name`/`version` taken from the requirement's `extra`. The nonce
/// is 32 random bytes; `validAfter` is backdated by
/// [`VALID_AFTER_SKEW_SECONDS`] and `validBefore` is
/// `now + maxTimeoutSeconds`.
///
/// # Errors
///
/// Returns [`ClientError::Signing`] if EIP-712 signing fails.
pub async fn sign_erc3009_authorization<S: SignerLike>(
    signer: &S,
    chain: Eip155ChainReference,
    requirements: &types::v2::PaymentRequirements,
) -> Result<Eip3009Payload, ClientError> {
    let (name, version) = requirements.extra.as_ref().map_or_else(
        || (String::new(), String::new()),
        |extra| (extra.name.clone(), extra.version.clone()),
    );

    let domain = eip712_domain! {
        name: name,
        version: version,
        chain_id: chain.inner(),
        verifying_contract: requirements.asset,
    };

    let now = UnixTimestamp::now();
    let valid_after = UnixTimestamp::from_secs(
        now.as_secs().saturating_sub(VALID_AFTER_SKEW_SECONDS),
    );
    let valid_before = now + requirements.max_timeout_seconds;
    let nonce: [u8; 32] = rand::rng().random();
    let nonce = FixedBytes(nonce);

    let authorization = Eip3009Authorization {
        from: signer.address(),
        to: requirements.pay_to,
        value: requirements.amount,
        valid_after,
        valid_before,
        nonce,
    };

    // The facilitator rebuilds this struct from the authorization to
    // recover the signer; every field must match exactly.
    let message = TransferWithAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value.into(),
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
    };

    let hash = message.eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&hash)
        .await
        .map_err(|e| ClientError::Signing(e.to_string()))?;

    Ok(Eip3009Payload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Client half of the EVM `exact` and `split` schemes.
///
/// Construct with [`Eip155Client::exact`] or [`Eip155Client::split`]; the
/// signing flow is identical, only the advertised scheme name differs.
#[derive(Debug)]
pub struct Eip155Client<S> {
    signer: S,
    scheme: &'static str,
}

impl<S> Eip155Client<S> {
    /// Creates a client half for the `exact` scheme.
    pub const fn exact(signer: S) -> Self {
        Self {
            signer,
            scheme: EXACT_SCHEME,
        }
    }

    /// Creates a client half for the `split` scheme.
    pub const fn split(signer: S) -> Self {
        Self {
            signer,
            scheme: SPLIT_SCHEME,
        }
    }
}

#[async_trait]
impl<S> SchemeClient for Eip155Client<S>
where
    S: SignerLike + 'static,
{
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "eip155"
    }

    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError> {
        let concrete: types::v2::PaymentRequirements =
            requirements.as_concrete().ok_or_else(|| {
                ClientError::InvalidRequirements("not valid eip155 requirements".into())
            })?;
        let chain = Eip155ChainReference::try_from(&requirements.network)
            .map_err(|e| ClientError::InvalidRequirements(e.to_string()))?;

        let payload = sign_erc3009_authorization(&self.signer, chain, &concrete).await?;

        Ok(PaymentPayload {
            x402_version: V2,
            scheme: self.scheme.to_owned(),
            network: requirements.network.clone(),
            payload: serde_json::to_value(&payload)?,
        })
    }
}
