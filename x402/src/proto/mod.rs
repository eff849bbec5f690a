//! Wire format types for x402 payment messages.
//!
//! Everything here serializes to camelCase JSON. The shapes are shared by
//! the HTTP facilitator API (`POST /verify`, `POST /settle`,
//! `GET /supported`) and the MCP metadata transport; the two carry
//! byte-identical JSON.
//!
//! # Key types
//!
//! - [`v2::PaymentRequirements`] / [`v2::PaymentPayload`] /
//!   [`v2::PaymentRequired`] - the three protocol messages
//! - [`VerifyRequest`] / [`SettleRequest`] - facilitator API bodies
//! - [`VerifyResponse`] - outcome of deterministic payload verification
//! - [`SettleResponse`] - outcome of on-chain settlement
//! - [`SupportedResponse`] - facilitator capability advertisement

mod encoding;
mod timestamp;
mod version;

pub mod v2;

pub use encoding::Base64Bytes;
pub use timestamp::UnixTimestamp;
pub use version::Version;

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{VecSkipError, serde_as};

/// Machine-readable reasons shared by all mechanisms.
///
/// Chain mechanisms define additional, chain-specific reason strings
/// (e.g. the `invalid_stellar_payload_*` family).
pub mod reason {
    /// The payload's `x402Version` is not the supported version.
    pub const INVALID_X402_VERSION: &str = "invalid_x402_version";
    /// No mechanism is registered for the requested scheme.
    pub const UNSUPPORTED_SCHEME: &str = "unsupported_scheme";
    /// The scheme exists but not for the requested network.
    pub const UNSUPPORTED_NETWORK: &str = "unsupported_network";
    /// The payload's scheme or network does not match the requirements.
    pub const REQUIREMENTS_MISMATCH: &str = "requirements_mismatch";
    /// The `split` recipients configuration is missing or invalid.
    pub const INVALID_SPLIT_CONFIG: &str = "invalid_split_config";
}

/// Body of a `POST /verify` request: the client's payload paired with the
/// requirements the server demanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The signed payment authorization.
    pub payment_payload: v2::PaymentPayload,
    /// The server's stated payment terms.
    pub payment_requirements: v2::PaymentRequirements,
}

/// Body of a `POST /settle` request.
///
/// Structurally identical to [`VerifyRequest`] on the wire, but a
/// distinct type so a verify body cannot be passed where a settle body is
/// expected. Convert with `From<VerifyRequest>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// The signed payment authorization.
    pub payment_payload: v2::PaymentPayload,
    /// The server's stated payment terms.
    pub payment_requirements: v2::PaymentRequirements,
}

impl From<VerifyRequest> for SettleRequest {
    fn from(request: VerifyRequest) -> Self {
        Self {
            payment_payload: request.payment_payload,
            payment_requirements: request.payment_requirements,
        }
    }
}

/// Result of verifying a payment payload against payment requirements.
///
/// Verification failures are expected control flow: they are carried in
/// this response, not in an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    /// The payload matches the requirements and passes all checks.
    Valid {
        /// The payer address recovered from the authorization.
        payer: String,
    },
    /// The payload failed verification.
    Invalid {
        /// Machine-readable reason verification failed.
        reason: String,
        /// The payer address, if it could be identified before failing.
        payer: Option<String>,
    },
}

impl VerifyResponse {
    /// Constructs a successful verification response.
    pub fn valid(payer: impl Into<String>) -> Self {
        Self::Valid {
            payer: payer.into(),
        }
    }

    /// Constructs a failed verification response.
    pub fn invalid(reason: impl Into<String>, payer: Option<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
            payer,
        }
    }

    /// Returns `true` if verification succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the payer address, if identified.
    #[must_use]
    pub fn payer(&self) -> Option<&str> {
        match self {
            Self::Valid { payer } => Some(payer),
            Self::Invalid { payer, .. } => payer.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
                payer: Some(payer.clone()),
            },
            Self::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(reason.clone()),
                payer: payer.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Result of an on-chain settlement attempt.
///
/// `transaction` is empty when the failure occurred before anything was
/// broadcast; after submission it always carries the hash, so callers can
/// reconcile timeouts and reverts. `extra` carries scheme-specific data:
/// the `split` mechanisms report per-recipient
/// [`SplitDistribution`](crate::split::SplitDistribution)s under
/// `splits`, and failures carry `{"error": <reason>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether the payment settled on-chain.
    pub success: bool,
    /// The transaction hash, or empty if nothing was broadcast.
    pub transaction: String,
    /// CAIP-2 chain ID of the network settlement ran on.
    pub network: String,
    /// The payer address, or empty if unknown.
    pub payer: String,
    /// Scheme-specific settlement metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl SettleResponse {
    /// Constructs a successful settlement response.
    pub fn settled(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            transaction: transaction.into(),
            network: network.into(),
            payer: payer.into(),
            extra: None,
        }
    }

    /// Constructs a failed settlement response with an error reason under
    /// `extra.error`.
    pub fn failed(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            transaction: transaction.into(),
            network: network.into(),
            payer: payer.into(),
            extra: Some(serde_json::json!({ "error": error.into() })),
        }
    }

    /// Attaches scheme-specific metadata, merging into any existing
    /// `extra` object.
    #[must_use]
    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        let mut extra = match self.extra.take() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        extra.insert(key.to_owned(), value);
        self.extra = Some(serde_json::Value::Object(extra));
        self
    }

    /// Returns the `extra.error` reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.extra.as_ref()?.get("error")?.as_str()
    }
}

/// One payment method supported by a facilitator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    /// The x402 protocol version.
    pub x402_version: u8,
    /// The payment scheme identifier.
    pub scheme: String,
    /// The network this kind applies to; may be a CAIP-2 wildcard
    /// pattern such as `eip155:*`.
    pub network: String,
    /// Scheme-specific extra data (e.g. `feePayer`, `areFeesSponsored`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Response from a facilitator's `GET /supported` endpoint.
///
/// Clients use this to pick a mechanism before building a payment, and
/// resource servers use `signers` to learn facilitator addresses (e.g.
/// the fee payer to embed in Solana requirements).
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// List of supported payment kinds. Unknown entries are skipped
    /// rather than failing the whole response.
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    /// Map of CAIP-2 patterns (exact or wildcard) to signer addresses.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

impl SupportedResponse {
    /// Finds signer addresses matching the given chain ID, checking the
    /// exact key first and then the namespace wildcard.
    #[must_use]
    pub fn signers_for_chain(&self, chain_id: &crate::chain::ChainId) -> Vec<&str> {
        let exact_key = chain_id.to_string();
        let wildcard_key = format!("{}:*", chain_id.namespace());

        let mut result = Vec::new();
        if let Some(addrs) = self.signers.get(&exact_key) {
            result.extend(addrs.iter().map(String::as_str));
        }
        if let Some(addrs) = self.signers.get(&wildcard_key) {
            result.extend(addrs.iter().map(String::as_str));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainId;

    #[test]
    fn verify_response_wire_shape() {
        let valid = VerifyResponse::valid("0xAbc");
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json, serde_json::json!({"isValid": true, "payer": "0xAbc"}));

        let invalid = VerifyResponse::invalid("unsupported_scheme", None);
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isValid": false, "invalidReason": "unsupported_scheme"})
        );

        let back: VerifyResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, invalid);
    }

    #[test]
    fn settle_response_failure_carries_error_extra() {
        let response = SettleResponse::failed("0xdead", "eip155:84532", "0xAbc", "reverted");
        assert!(!response.success);
        assert_eq!(response.error(), Some("reverted"));
        let json = serde_json::to_value(&response).unwrap();
        let back: SettleResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn settle_response_with_extra_merges() {
        let response = SettleResponse::settled("0xbeef", "eip155:84532", "0xAbc")
            .with_extra("splits", serde_json::json!([]))
            .with_extra("escrow", serde_json::json!("0xEscrow"));
        let extra = response.extra.unwrap();
        assert!(extra.get("splits").is_some());
        assert!(extra.get("escrow").is_some());
    }

    #[test]
    fn supported_signers_lookup_prefers_exact_then_wildcard() {
        let mut supported = SupportedResponse::default();
        supported
            .signers
            .insert("eip155:8453".into(), vec!["0xExact".into()]);
        supported
            .signers
            .insert("eip155:*".into(), vec!["0xWild".into()]);
        let found = supported.signers_for_chain(&ChainId::new("eip155", "8453"));
        assert_eq!(found, vec!["0xExact", "0xWild"]);
        let found = supported.signers_for_chain(&ChainId::new("eip155", "1"));
        assert_eq!(found, vec!["0xWild"]);
    }
}
