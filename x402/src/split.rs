//! Basis-point split configuration and share allocation.
//!
//! The `split` scheme routes one payment to N recipients. Each recipient
//! is assigned a share in basis points (1/100 of a percent); shares must
//! sum to exactly 10000. Allocation uses floor division with the
//! remainder absorbed by the **last** recipient, so the shares always sum
//! to the total with no dust lost to rounding. That rule is uniform
//! across all chain mechanisms and each mechanism carries a test pinning
//! it.

use serde::{Deserialize, Serialize};

/// Total basis points in one whole: 10000 bps = 100%.
pub const TOTAL_BPS: u16 = 10_000;

/// One recipient of a split payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRecipient {
    /// Wallet address, in the owning network's native format.
    pub address: String,
    /// Share in basis points, `1..=10000`.
    pub bps: u16,
    /// Optional human-readable label carried through to settlement
    /// metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Errors produced by [`SplitConfig::validate`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SplitConfigError {
    /// The recipients list is empty.
    #[error("split must have at least 1 recipient")]
    NoRecipients,
    /// A recipient's address is empty.
    #[error("recipient address cannot be empty")]
    EmptyAddress,
    /// A recipient's bps is outside `1..=10000`.
    #[error("recipient bps must be 1-10000, got {0}")]
    BpsOutOfRange(u16),
    /// The bps of all recipients do not sum to 10000.
    #[error("recipient bps must sum to 10000, got {0}")]
    BadBpsSum(u32),
}

/// The validated recipients list of a `split` requirement.
///
/// Carried on the wire inside `PaymentRequirements.extra.recipients`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitConfig {
    /// The split recipients, in payout order.
    pub recipients: Vec<SplitRecipient>,
}

impl SplitConfig {
    /// Creates a config from a recipients list.
    #[must_use]
    pub const fn new(recipients: Vec<SplitRecipient>) -> Self {
        Self { recipients }
    }

    /// Parses the config out of a requirement's `extra` field.
    ///
    /// Returns `None` when `extra` is absent or has no `recipients` key,
    /// and `None` when the key is present but malformed.
    #[must_use]
    pub fn from_extra(extra: Option<&serde_json::Value>) -> Option<Self> {
        let recipients = extra?.get("recipients")?;
        serde_json::from_value(serde_json::json!({ "recipients": recipients })).ok()
    }

    /// Validates the recipients list.
    ///
    /// Accepts iff the list is non-empty, every address is non-empty,
    /// every bps is in `1..=10000`, and the bps sum to exactly 10000.
    ///
    /// # Errors
    ///
    /// Returns the first [`SplitConfigError`] encountered.
    pub fn validate(&self) -> Result<(), SplitConfigError> {
        if self.recipients.is_empty() {
            return Err(SplitConfigError::NoRecipients);
        }
        for recipient in &self.recipients {
            if recipient.address.is_empty() {
                return Err(SplitConfigError::EmptyAddress);
            }
            if recipient.bps < 1 || recipient.bps > TOTAL_BPS {
                return Err(SplitConfigError::BpsOutOfRange(recipient.bps));
            }
        }
        let total: u32 = self.recipients.iter().map(|r| u32::from(r.bps)).sum();
        if total != u32::from(TOTAL_BPS) {
            return Err(SplitConfigError::BadBpsSum(total));
        }
        Ok(())
    }

    /// Computes each recipient's share of `total` atomic units.
    ///
    /// For i < N-1, `share_i = total * bps_i / 10000` (floor); the last
    /// recipient receives `total - sum(previous shares)`, which makes the
    /// shares sum to `total` for every input.
    ///
    /// Call [`SplitConfig::validate`] first; on an unvalidated config the
    /// shares are still conserved but may be meaningless.
    #[must_use]
    pub fn calculate_shares(&self, total: u128) -> Vec<u128> {
        let mut shares = Vec::with_capacity(self.recipients.len());
        let mut allocated: u128 = 0;
        for (i, recipient) in self.recipients.iter().enumerate() {
            let share = if i == self.recipients.len() - 1 {
                total - allocated
            } else {
                total * u128::from(recipient.bps) / u128::from(TOTAL_BPS)
            };
            allocated += share;
            shares.push(share);
        }
        shares
    }
}

/// How a recipient's share was (or will be) delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMethod {
    /// Credited on an internal ledger; no per-recipient on-chain hop.
    Internal,
    /// Delivered by an individual on-chain transfer.
    Onchain,
    /// Queued into a batched on-chain payout.
    Batch,
}

/// One entry of the `extra.splits` settlement metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitDistribution {
    /// The recipient address.
    pub address: String,
    /// The recipient's share in atomic units, as a decimal string.
    pub amount: String,
    /// How the share was delivered.
    pub method: SettlementMethod,
    /// Label copied from the recipient config, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bps: &[u16]) -> SplitConfig {
        SplitConfig::new(
            bps.iter()
                .enumerate()
                .map(|(i, &bps)| SplitRecipient {
                    address: format!("addr{i}"),
                    bps,
                    label: None,
                })
                .collect(),
        )
    }

    #[test]
    fn validate_accepts_single_and_multi_recipient() {
        assert_eq!(config(&[10_000]).validate(), Ok(()));
        assert_eq!(config(&[7000, 2000, 1000]).validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_boundary_bps() {
        assert_eq!(
            config(&[]).validate(),
            Err(SplitConfigError::NoRecipients)
        );
        assert_eq!(
            config(&[10_000, 0]).validate(),
            Err(SplitConfigError::BpsOutOfRange(0))
        );
        assert_eq!(
            config(&[10_001]).validate(),
            Err(SplitConfigError::BpsOutOfRange(10_001))
        );
        assert_eq!(
            config(&[7000, 2000]).validate(),
            Err(SplitConfigError::BadBpsSum(9000))
        );
    }

    #[test]
    fn shares_70_20_10() {
        let shares = config(&[7000, 2000, 1000]).calculate_shares(30_000_000);
        assert_eq!(shares, vec![21_000_000, 6_000_000, 3_000_000]);
    }

    #[test]
    fn shares_dust_goes_to_last_recipient() {
        let shares = config(&[3333, 3333, 3334]).calculate_shares(10);
        assert_eq!(shares, vec![3, 3, 4]);
        assert_eq!(shares.iter().sum::<u128>(), 10);
    }

    #[test]
    fn shares_conserve_total() {
        let cfg = config(&[1, 9999]);
        for total in [0u128, 1, 7, 999, 10_000, 2u128.pow(64) - 1] {
            let shares = cfg.calculate_shares(total);
            assert_eq!(shares.iter().sum::<u128>(), total, "total {total}");
        }
    }

    #[test]
    fn recipient_json_round_trip_is_identity() {
        let recipient = SplitRecipient {
            address: "GABC".into(),
            bps: 2500,
            label: Some("artist".into()),
        };
        let json = serde_json::to_value(&recipient).unwrap();
        let back: SplitRecipient = serde_json::from_value(json).unwrap();
        assert_eq!(back, recipient);

        let unlabeled = SplitRecipient {
            address: "GDEF".into(),
            bps: 7500,
            label: None,
        };
        let json = serde_json::to_value(&unlabeled).unwrap();
        assert!(json.get("label").is_none());
    }

    #[test]
    fn from_extra_requires_recipients_key() {
        assert!(SplitConfig::from_extra(None).is_none());
        assert!(SplitConfig::from_extra(Some(&serde_json::json!({}))).is_none());
        let extra = serde_json::json!({
            "recipients": [{"address": "a", "bps": 10000}]
        });
        let cfg = SplitConfig::from_extra(Some(&extra)).unwrap();
        assert_eq!(cfg.recipients.len(), 1);
    }
}
