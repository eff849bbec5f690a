//! The Stellar `split` scheme.
//!
//! The on-chain movement is the same single `transfer` to the escrow
//! address as `exact`; the recipients configuration is validated up
//! front and, after settlement, per-recipient shares are recorded as
//! internal ledger credits (no second on-chain hop). Shares follow the
//! floor-with-remainder-to-last rule.

use async_trait::async_trait;
use x402::facilitator::FacilitatorError;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};
use x402::scheme::{SPLIT_SCHEME, SchemeFacilitator};
use x402::split::{SettlementMethod, SplitConfig, SplitDistribution};

use crate::chain::is_valid_destination_address;
use crate::exact::facilitator::{StellarCore, StructuredTransfer, VerifyFailure};

pub use crate::exact::client::StellarClient;
pub use crate::exact::server::StellarServer;

/// Facilitator for the Stellar `split` scheme.
#[derive(Debug)]
pub struct StellarSplitFacilitator {
    core: StellarCore,
}

impl StellarSplitFacilitator {
    /// Creates the facilitator over a [`StellarCore`].
    #[must_use]
    pub const fn new(core: StellarCore) -> Self {
        Self { core }
    }

    /// Validates the split configuration, then runs the full exact-style
    /// verification under the `split` scheme name.
    async fn verify_split(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<(StructuredTransfer, SplitConfig), VerifyFailure> {
        let config = validate_split_config(requirements)?;
        let structured = self
            .core
            .verify_payment(SPLIT_SCHEME, payload, requirements)
            .await?;
        Ok((structured, config))
    }
}

/// Parses and validates `extra.recipients`, including address format.
fn validate_split_config(
    requirements: &PaymentRequirements,
) -> Result<SplitConfig, VerifyFailure> {
    let config = SplitConfig::from_extra(requirements.extra.as_ref()).ok_or_else(|| {
        VerifyFailure {
            reason: "invalid_split_config".into(),
            payer: None,
        }
    })?;
    if config.validate().is_err() {
        return Err(VerifyFailure {
            reason: "invalid_split_config".into(),
            payer: None,
        });
    }
    for recipient in &config.recipients {
        if !is_valid_destination_address(&recipient.address) {
            return Err(VerifyFailure {
                reason: format!("invalid_recipient_address: {}", recipient.address),
                payer: None,
            });
        }
    }
    Ok(config)
}

/// Computes the `extra.splits` entries recorded after settlement.
fn distributions(config: &SplitConfig, total: u128) -> Vec<SplitDistribution> {
    let shares = config.calculate_shares(total);
    config
        .recipients
        .iter()
        .zip(shares)
        .map(|(recipient, share)| SplitDistribution {
            address: recipient.address.clone(),
            amount: share.to_string(),
            method: SettlementMethod::Internal,
            label: recipient.label.clone(),
        })
        .collect()
}

#[async_trait]
impl SchemeFacilitator for StellarSplitFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        match self.verify_split(payload, requirements).await {
            Ok((structured, _)) => Ok(VerifyResponse::valid(structured.payer)),
            Err(failure) => Ok(failure.into()),
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let (structured, config) = match self.verify_split(payload, requirements).await {
            Ok(verified) => verified,
            Err(failure) => {
                return Ok(SettleResponse::failed(
                    "",
                    requirements.network.to_string(),
                    failure.payer.unwrap_or_default(),
                    failure.reason,
                ));
            }
        };

        let response = self.core.settle_payment(&structured, requirements).await;
        if !response.success {
            return Ok(response);
        }

        // The structural check pinned the transfer amount to
        // requirements.amount, so the escrow received exactly this total.
        let total = match requirements.amount.parse::<u128>() {
            Ok(total) => total,
            Err(_) => {
                return Ok(response.with_extra(
                    "error",
                    serde_json::Value::String("split_amount_overflow".into()),
                ));
            }
        };
        let splits = distributions(&config, total);
        tracing::info!(recipients = splits.len(), "stellar split recorded");
        Ok(response.with_extra(
            "splits",
            serde_json::to_value(&splits).unwrap_or_default(),
        ))
    }

    fn signers(&self) -> Vec<String> {
        vec![self.core.address().to_owned()]
    }

    fn extra(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "areFeesSponsored": true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402::chain::ChainId;
    use x402::split::SplitRecipient;

    use crate::signer::StellarKeypair;

    fn account(seed: u8) -> String {
        StellarKeypair::from_secret_bytes([seed; 32])
            .public_key()
            .to_owned()
    }

    fn requirements(extra: Option<serde_json::Value>) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "split".into(),
            network: ChainId::new("stellar", "testnet"),
            asset: "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC".into(),
            pay_to: account(1),
            amount: "10".into(),
            max_timeout_seconds: 300,
            extra,
        }
    }

    #[test]
    fn split_config_must_be_present_and_valid() {
        let missing = validate_split_config(&requirements(None)).unwrap_err();
        assert_eq!(missing.reason, "invalid_split_config");

        let bad_sum = requirements(Some(serde_json::json!({
            "recipients": [{"address": account(2), "bps": 9000}]
        })));
        assert_eq!(
            validate_split_config(&bad_sum).unwrap_err().reason,
            "invalid_split_config"
        );

        let bad_address = requirements(Some(serde_json::json!({
            "recipients": [{"address": "nope", "bps": 10000}]
        })));
        assert!(
            validate_split_config(&bad_address)
                .unwrap_err()
                .reason
                .starts_with("invalid_recipient_address")
        );
    }

    #[test]
    fn dust_goes_to_last_recipient() {
        let config = SplitConfig::new(vec![
            SplitRecipient {
                address: account(2),
                bps: 3333,
                label: None,
            },
            SplitRecipient {
                address: account(3),
                bps: 3333,
                label: None,
            },
            SplitRecipient {
                address: account(4),
                bps: 3334,
                label: None,
            },
        ]);
        let splits = distributions(&config, 10);
        let amounts: Vec<&str> = splits.iter().map(|s| s.amount.as_str()).collect();
        assert_eq!(amounts, vec!["3", "3", "4"]);
        assert!(
            splits
                .iter()
                .all(|s| s.method == SettlementMethod::Internal)
        );
    }
}
