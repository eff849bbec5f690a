//! Facilitator half of the EVM `exact` scheme.

pub mod contract;
pub mod signature;
pub mod settle;
pub mod verify;

use alloy_primitives::Address;
use alloy_provider::Provider;
use async_trait::async_trait;
use x402::facilitator::FacilitatorError;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};
use x402::scheme::{EXACT_SCHEME, SchemeFacilitator};

use self::verify::{AmountRule, check_payment, verify_signature};
use crate::chain::Eip155ChainReference;

/// Facilitator for the EVM `exact` scheme on one chain.
///
/// The provider must carry a funded wallet; settlement transactions are
/// sent from it. Instances are immutable after construction and safe to
/// share across concurrent requests.
#[derive(Debug)]
pub struct Eip155ExactFacilitator<P> {
    provider: P,
    chain: Eip155ChainReference,
    signer_address: Address,
}

impl<P> Eip155ExactFacilitator<P> {
    /// Creates a facilitator over a wallet-carrying provider.
    pub const fn new(provider: P, chain: Eip155ChainReference, signer_address: Address) -> Self {
        Self {
            provider,
            chain,
            signer_address,
        }
    }
}

#[async_trait]
impl<P> SchemeFacilitator for Eip155ExactFacilitator<P>
where
    P: Provider + Send + Sync + 'static,
{
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let checked = match check_payment(
            EXACT_SCHEME,
            self.chain,
            AmountRule::Exact,
            payload,
            requirements,
        ) {
            Ok(checked) => checked,
            Err(failure) => return Ok(VerifyResponse::invalid(failure.reason, failure.payer)),
        };
        match verify_signature(&self.provider, &checked).await {
            Ok(payer) => Ok(VerifyResponse::valid(payer.to_string())),
            Err(failure) => Ok(VerifyResponse::invalid(failure.reason, failure.payer)),
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let network = requirements.network.to_string();
        let checked = match check_payment(
            EXACT_SCHEME,
            self.chain,
            AmountRule::Exact,
            payload,
            requirements,
        ) {
            Ok(checked) => checked,
            Err(failure) => {
                return Ok(SettleResponse::failed(
                    "",
                    network,
                    failure.payer.unwrap_or_default(),
                    failure.reason,
                ));
            }
        };
        let payer = match verify_signature(&self.provider, &checked).await {
            Ok(payer) => payer,
            Err(failure) => {
                return Ok(SettleResponse::failed(
                    "",
                    network,
                    failure.payer.unwrap_or_default(),
                    failure.reason,
                ));
            }
        };

        match settle::settle_payment(&self.provider, &checked).await {
            Ok(hash) => Ok(SettleResponse::settled(
                hash.to_string(),
                network,
                payer.to_string(),
            )),
            Err(failure) => Ok(SettleResponse::failed(
                failure
                    .transaction
                    .map(|h| h.to_string())
                    .unwrap_or_default(),
                network,
                payer.to_string(),
                failure.reason,
            )),
        }
    }

    fn signers(&self) -> Vec<String> {
        vec![self.signer_address.to_string()]
    }
}
