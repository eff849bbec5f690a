//! The Solana `split` scheme.
//!
//! The client pays the whole amount into the facilitator's escrow ATA
//! (structurally identical to `exact`, but overpayment is accepted).
//! After the escrow transfer confirms, the facilitator issues one
//! `TransferChecked` per recipient from the escrow to the recipient's
//! ATA, sequentially, using the floor-with-remainder-to-last share rule,
//! and aggregates the transfer signatures under `extra.distributions`.

use std::time::Duration;

use async_trait::async_trait;
use solana_keypair::Keypair;
use solana_message::{Message, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

use x402::facilitator::FacilitatorError;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};
use x402::scheme::{SPLIT_SCHEME, SchemeFacilitator};
use x402::split::{SettlementMethod, SplitConfig, SplitDistribution};

use crate::chain::{CONFIRM_TIMEOUT_SECONDS, SolanaProvider, derive_ata};
use crate::exact::client::requirement_decimals;
use crate::exact::facilitator::{AmountRule, check_payment, settle_transaction};

pub use crate::exact::client::SvmClient;
pub use crate::exact::server::SvmServer;

/// One completed distribution transfer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DistributionRecord {
    address: String,
    amount: String,
    transaction: String,
}

/// Facilitator for the Solana `split` scheme.
#[derive(Debug)]
pub struct SvmSplitFacilitator {
    provider: SolanaProvider,
}

impl SvmSplitFacilitator {
    /// Creates the facilitator over a provider. The provider's keypair
    /// owns the escrow token accounts.
    #[must_use]
    pub const fn new(provider: SolanaProvider) -> Self {
        Self { provider }
    }

    /// Sends one distribution transfer and waits for confirmation.
    async fn distribute_share(
        &self,
        mint: &Pubkey,
        token_program: &Pubkey,
        decimals: u8,
        recipient: &Pubkey,
        share: u64,
    ) -> Result<String, String> {
        let keypair: &Keypair = self.provider.keypair();
        let escrow_owner = keypair.pubkey();
        let source = derive_ata(&escrow_owner, mint, token_program);
        let destination = derive_ata(recipient, mint, token_program);

        let instruction = spl_token::instruction::transfer_checked(
            token_program,
            &source,
            mint,
            &destination,
            &escrow_owner,
            &[],
            share,
            decimals,
        )
        .map_err(|e| format!("distribution_build_failed: {e}"))?;

        let blockhash = self
            .provider
            .rpc()
            .get_latest_blockhash()
            .await
            .map_err(|e| format!("distribution_blockhash_failed: {e}"))?;
        let message = Message::new_with_blockhash(&[instruction], Some(&escrow_owner), &blockhash);
        let tx = VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[keypair])
            .map_err(|e| format!("distribution_signing_failed: {e}"))?;

        let confirmed = tokio::time::timeout(
            Duration::from_secs(CONFIRM_TIMEOUT_SECONDS),
            self.provider.rpc().send_and_confirm_transaction(&tx),
        )
        .await
        .map_err(|_| "distribution_confirmation_timeout".to_owned())?
        .map_err(|e| format!("distribution_failed: {e}"))?;
        Ok(confirmed.to_string())
    }
}

#[async_trait]
impl SchemeFacilitator for SvmSplitFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        match check_payment(
            SPLIT_SCHEME,
            self.provider.chain(),
            AmountRule::AtLeast,
            &self.provider.pubkey(),
            payload,
            requirements,
        ) {
            Ok((_, info)) => Ok(VerifyResponse::valid(info.authority.to_string())),
            Err(failure) => Ok(VerifyResponse::invalid(failure.reason, failure.payer)),
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let network = requirements.network.to_string();
        let (tx, info) = match check_payment(
            SPLIT_SCHEME,
            self.provider.chain(),
            AmountRule::AtLeast,
            &self.provider.pubkey(),
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
        let payer = info.authority.to_string();

        // check_payment already validated the config.
        let Some(config) = SplitConfig::from_extra(requirements.extra.as_ref()) else {
            return Ok(SettleResponse::failed(
                "",
                network,
                payer,
                "invalid_split_config",
            ));
        };

        let escrow_hash = match settle_transaction(&self.provider, tx).await {
            Ok(hash) => hash,
            Err(failure) => {
                return Ok(SettleResponse::failed(
                    failure.transaction.unwrap_or_default(),
                    network,
                    payer,
                    failure.reason,
                ));
            }
        };

        // Distribute from the escrow, sequentially. Shares come from the
        // escrowed total, which may exceed the required amount.
        let total = u128::from(info.amount);
        let shares = config.calculate_shares(total);
        let decimals = requirement_decimals(requirements);

        let mut splits = Vec::with_capacity(config.recipients.len());
        let mut records = Vec::with_capacity(config.recipients.len());
        for (recipient, share) in config.recipients.iter().zip(shares) {
            let Ok(share_u64) = u64::try_from(share) else {
                return Ok(SettleResponse::failed(
                    escrow_hash,
                    network,
                    payer,
                    "split_amount_overflow",
                ));
            };
            let Ok(recipient_key) = recipient.address.parse::<Pubkey>() else {
                return Ok(SettleResponse::failed(
                    escrow_hash,
                    network,
                    payer,
                    "invalid_recipient_address",
                ));
            };
            match self
                .distribute_share(&info.mint, &info.token_program, decimals, &recipient_key, share_u64)
                .await
            {
                Ok(signature) => {
                    records.push(DistributionRecord {
                        address: recipient.address.clone(),
                        amount: share.to_string(),
                        transaction: signature,
                    });
                    splits.push(SplitDistribution {
                        address: recipient.address.clone(),
                        amount: share.to_string(),
                        method: SettlementMethod::Onchain,
                        label: recipient.label.clone(),
                    });
                }
                Err(reason) => {
                    tracing::warn!(recipient = %recipient.address, reason = %reason, "distribution transfer failed");
                    // The escrow transfer is final; report the partial
                    // distribution state with the escrow hash.
                    return Ok(SettleResponse::failed(escrow_hash, network, payer, reason)
                        .with_extra(
                            "distributions",
                            serde_json::to_value(&records).unwrap_or_default(),
                        ));
                }
            }
        }

        tracing::info!(tx = %escrow_hash, recipients = splits.len(), "solana split settled");
        Ok(
            SettleResponse::settled(escrow_hash, network, payer)
                .with_extra("splits", serde_json::to_value(&splits).unwrap_or_default())
                .with_extra(
                    "distributions",
                    serde_json::to_value(&records).unwrap_or_default(),
                ),
        )
    }

    fn signers(&self) -> Vec<String> {
        vec![self.provider.pubkey().to_string()]
    }

    fn extra(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "feePayer": self.provider.pubkey().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use x402::split::{SplitConfig, SplitRecipient};

    fn config(bps: &[u16]) -> SplitConfig {
        SplitConfig::new(
            bps.iter()
                .map(|&bps| SplitRecipient {
                    address: solana_pubkey::Pubkey::new_unique().to_string(),
                    bps,
                    label: None,
                })
                .collect(),
        )
    }

    #[test]
    fn dust_goes_to_last_recipient() {
        let shares = config(&[3333, 3333, 3334]).calculate_shares(10);
        assert_eq!(shares, vec![3, 3, 4]);
    }

    #[test]
    fn shares_cover_the_escrowed_total_including_overpayment() {
        // Escrow received more than required; every lamport is split.
        let shares = config(&[7000, 2000, 1000]).calculate_shares(30_000_007);
        assert_eq!(shares.iter().sum::<u128>(), 30_000_007);
        assert_eq!(shares[2], 30_000_007 - 21_000_004 - 6_000_001);
    }
}
