//! The EVM `split` scheme.
//!
//! From the client's perspective a split payment is identical to `exact`:
//! one EIP-3009 authorization for the whole amount, paid to the
//! facilitator's escrow address ([`Eip155Client::split`] reuses the exact
//! signing path). The facilitator additionally validates the recipients
//! configuration, accepts overpayment (the escrow receives the entire
//! value), and after on-chain settlement computes per-recipient shares
//! with the remainder going to the last recipient.
//!
//! Distribution itself is delegated: a [`SettlementCallback`] may route
//! each share (internal ledger credit, on-chain payout, batch queue) and
//! report the method used; without one, shares are recorded as
//! `internal`. No further on-chain transfer is mandated here.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use async_trait::async_trait;
use x402::facilitator::FacilitatorError;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};
use x402::scheme::{SPLIT_SCHEME, SchemeFacilitator};
use x402::split::{SettlementMethod, SplitConfig, SplitDistribution, SplitRecipient};

use crate::chain::Eip155ChainReference;
use crate::exact::facilitator::settle::settle_payment;
use crate::exact::facilitator::verify::{
    AmountRule, check_payment, verify_signature,
};

pub use crate::exact::client::Eip155Client;
pub use crate::exact::server::Eip155Server;

/// Per-recipient settlement hook: given the recipient, its share, and the
/// escrow transaction hash, routes the share and reports how.
pub type SettlementCallback =
    Arc<dyn Fn(&SplitRecipient, u128, &str) -> SettlementMethod + Send + Sync>;

/// Facilitator for the EVM `split` scheme on one chain.
pub struct Eip155SplitFacilitator<P> {
    provider: P,
    chain: Eip155ChainReference,
    signer_address: Address,
    callback: Option<SettlementCallback>,
}

impl<P> std::fmt::Debug for Eip155SplitFacilitator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eip155SplitFacilitator")
            .field("chain", &self.chain)
            .field("signer_address", &self.signer_address)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish_non_exhaustive()
    }
}

impl<P> Eip155SplitFacilitator<P> {
    /// Creates a split facilitator over a wallet-carrying provider.
    pub const fn new(provider: P, chain: Eip155ChainReference, signer_address: Address) -> Self {
        Self {
            provider,
            chain,
            signer_address,
            callback: None,
        }
    }

    /// Installs a per-recipient settlement callback.
    #[must_use]
    pub fn with_settlement_callback(mut self, callback: SettlementCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// Computes the `extra.splits` entries for a settled escrow transfer.
///
/// Shares follow the floor-with-remainder-to-last rule; the callback (or
/// `internal` by default) tags each entry with its delivery method.
fn distributions(
    config: &SplitConfig,
    total: u128,
    tx_hash: &str,
    callback: Option<&SettlementCallback>,
) -> Vec<SplitDistribution> {
    let shares = config.calculate_shares(total);
    config
        .recipients
        .iter()
        .zip(shares)
        .map(|(recipient, share)| {
            let method = callback.map_or(SettlementMethod::Internal, |cb| {
                cb(recipient, share, tx_hash)
            });
            SplitDistribution {
                address: recipient.address.clone(),
                amount: share.to_string(),
                method,
                label: recipient.label.clone(),
            }
        })
        .collect()
}

#[async_trait]
impl<P> SchemeFacilitator for Eip155SplitFacilitator<P>
where
    P: Provider + Send + Sync + 'static,
{
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let checked = match check_payment(
            SPLIT_SCHEME,
            self.chain,
            AmountRule::AtLeast,
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
            SPLIT_SCHEME,
            self.chain,
            AmountRule::AtLeast,
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

        // check_payment validated presence and bps already.
        let Some(config) = SplitConfig::from_extra(requirements.extra.as_ref()) else {
            return Ok(SettleResponse::failed(
                "",
                network,
                payer.to_string(),
                "invalid_split_config",
            ));
        };
        let value: U256 = checked.payload.authorization.value.into();
        let Ok(total) = u128::try_from(value) else {
            return Ok(SettleResponse::failed(
                "",
                network,
                payer.to_string(),
                "split_amount_overflow",
            ));
        };

        match settle_payment(&self.provider, &checked).await {
            Ok(hash) => {
                let hash = hash.to_string();
                let splits = distributions(&config, total, &hash, self.callback.as_ref());
                tracing::info!(tx = %hash, recipients = splits.len(), "split escrow settled");
                let response = SettleResponse::settled(hash, network, payer.to_string())
                    .with_extra("splits", serde_json::to_value(&splits).unwrap_or_default());
                Ok(response)
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bps: &[u16]) -> SplitConfig {
        SplitConfig::new(
            bps.iter()
                .enumerate()
                .map(|(i, &bps)| SplitRecipient {
                    address: format!("0x{i:040x}"),
                    bps,
                    label: (i == 0).then(|| "first".to_owned()),
                })
                .collect(),
        )
    }

    #[test]
    fn dust_goes_to_last_recipient() {
        let splits = distributions(&config(&[3333, 3333, 3334]), 10, "0xhash", None);
        let amounts: Vec<&str> = splits.iter().map(|s| s.amount.as_str()).collect();
        assert_eq!(amounts, vec!["3", "3", "4"]);
    }

    #[test]
    fn distributions_default_to_internal_and_keep_labels() {
        let splits = distributions(&config(&[7000, 2000, 1000]), 30_000_000, "0xhash", None);
        assert_eq!(splits[0].amount, "21000000");
        assert_eq!(splits[1].amount, "6000000");
        assert_eq!(splits[2].amount, "3000000");
        assert!(splits.iter().all(|s| s.method == SettlementMethod::Internal));
        assert_eq!(splits[0].label.as_deref(), Some("first"));
    }

    #[test]
    fn callback_overrides_method() {
        let callback: SettlementCallback =
            Arc::new(|recipient, _, _| {
                if recipient.bps > 5000 {
                    SettlementMethod::Onchain
                } else {
                    SettlementMethod::Batch
                }
            });
        let splits = distributions(
            &config(&[7000, 3000]),
            100,
            "0xhash",
            Some(&callback),
        );
        assert_eq!(splits[0].method, SettlementMethod::Onchain);
        assert_eq!(splits[1].method, SettlementMethod::Batch);
    }
}
