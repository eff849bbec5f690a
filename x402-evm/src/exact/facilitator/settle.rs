//! On-chain settlement for EVM payments.
//!
//! Submits `transferWithAuthorization` from the facilitator's funded
//! signer and waits for one confirmation. Counterfactual (EIP-6492)
//! wallets are deployed in the same transaction through Multicall3.

use alloy_primitives::{B256, TxHash, U256};
use alloy_provider::{MULTICALL3_ADDRESS, MulticallItem, Provider};

use super::contract::{IEIP3009, IMulticall3};
use super::signature::StructuredSignature;
use super::verify::CheckedPayment;

/// A settlement failure with the transaction hash when one exists.
#[derive(Debug)]
pub struct SettleFailure {
    /// Machine-readable reason string.
    pub reason: String,
    /// The transaction hash, if the transaction was broadcast.
    pub transaction: Option<TxHash>,
}

impl SettleFailure {
    fn submission(e: impl std::fmt::Display) -> Self {
        Self {
            reason: format!("submission_failed: {e}"),
            transaction: None,
        }
    }
}

/// Submits the transfer and waits for one confirmation.
///
/// # Errors
///
/// Returns [`SettleFailure`] when submission fails or the transaction
/// reverts; a revert carries the transaction hash for reconciliation.
pub async fn settle_payment<P: Provider>(
    provider: &P,
    checked: &CheckedPayment,
) -> Result<TxHash, SettleFailure> {
    let authorization = &checked.payload.authorization;
    let contract = IEIP3009::new(checked.requirements.asset, provider);
    let valid_after = U256::from(authorization.valid_after.as_secs());
    let valid_before = U256::from(authorization.valid_before.as_secs());

    let receipt = match &checked.signature {
        StructuredSignature::Eoa(signature) => {
            let v = 27 + u8::from(signature.v());
            let r = B256::from(signature.r());
            let s = B256::from(signature.s());
            let call = contract.transferWithAuthorization_1(
                authorization.from,
                authorization.to,
                authorization.value.into(),
                valid_after,
                valid_before,
                authorization.nonce,
                v,
                r,
                s,
            );
            call.send()
                .await
                .map_err(SettleFailure::submission)?
                .get_receipt()
                .await
                .map_err(SettleFailure::submission)?
        }
        StructuredSignature::Eip1271(bytes) => {
            let call = contract.transferWithAuthorization_0(
                authorization.from,
                authorization.to,
                authorization.value.into(),
                valid_after,
                valid_before,
                authorization.nonce,
                bytes.clone(),
            );
            call.send()
                .await
                .map_err(SettleFailure::submission)?
                .get_receipt()
                .await
                .map_err(SettleFailure::submission)?
        }
        StructuredSignature::Eip6492 {
            factory,
            factory_calldata,
            inner,
            ..
        } => {
            let transfer = contract.transferWithAuthorization_0(
                authorization.from,
                authorization.to,
                authorization.value.into(),
                valid_after,
                valid_before,
                authorization.nonce,
                inner.clone(),
            );

            let deployed = provider
                .get_code_at(authorization.from)
                .await
                .map(|code| !code.is_empty())
                .map_err(SettleFailure::submission)?;

            if deployed {
                transfer
                    .send()
                    .await
                    .map_err(SettleFailure::submission)?
                    .get_receipt()
                    .await
                    .map_err(SettleFailure::submission)?
            } else {
                // Deploy the wallet and execute the transfer atomically.
                // The deployment may no-op if raced; only the transfer
                // must succeed.
                let target = transfer.target();
                let calls = vec![
                    IMulticall3::Call3 {
                        target: *factory,
                        allowFailure: true,
                        callData: factory_calldata.clone(),
                    },
                    IMulticall3::Call3 {
                        target,
                        allowFailure: false,
                        callData: transfer.calldata().clone(),
                    },
                ];
                let multicall = IMulticall3::new(MULTICALL3_ADDRESS, provider);
                multicall
                    .aggregate3(calls)
                    .send()
                    .await
                    .map_err(SettleFailure::submission)?
                    .get_receipt()
                    .await
                    .map_err(SettleFailure::submission)?
            }
        }
    };

    let hash = receipt.transaction_hash;
    if receipt.status() {
        tracing::info!(tx = %hash, "transferWithAuthorization confirmed");
        Ok(hash)
    } else {
        tracing::warn!(tx = %hash, "transferWithAuthorization reverted");
        Err(SettleFailure {
            reason: "transaction_reverted".into(),
            transaction: Some(hash),
        })
    }
}
