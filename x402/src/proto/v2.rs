//! Protocol version 2 wire types.
//!
//! These are the three messages of the payment protocol: the server's
//! [`PaymentRequired`] envelope with its [`PaymentRequirements`], the
//! client's signed [`PaymentPayload`], and (from the facilitator) the
//! responses defined in the parent module. Networks are named by CAIP-2
//! chain IDs (`eip155:8453`, `stellar:testnet`, ...).
//!
//! Amounts are decimal strings of atomic units. Mechanisms narrow the
//! stringly-typed defaults to concrete chain types via
//! [`PaymentRequirements::as_concrete`].

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;

/// Version marker for x402 protocol version 2.
///
/// Serializes as the integer `2` and rejects other values on
/// deserialization.
pub type X402Version2 = super::Version<2>;

/// Convenience constant for constructing V2 protocol messages.
pub const V2: X402Version2 = super::Version;

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL (or `mcp://tool/<name>` URI) of the resource.
    pub url: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource content.
    pub mime_type: String,
}

/// Payment terms demanded by the resource server.
///
/// # Type Parameters
///
/// The defaults are the wire representation (strings and raw JSON).
/// Mechanisms use [`PaymentRequirements::as_concrete`] to obtain typed
/// views, e.g. `U256` amounts and checksummed addresses on EVM.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TScheme = String,
    TAmount = String,
    TAddress = String,
    TExtra = serde_json::Value,
> {
    /// The payment scheme (`"exact"` or `"split"`).
    pub scheme: TScheme,
    /// The CAIP-2 chain ID.
    pub network: ChainId,
    /// Token contract / mint address; format depends on the network.
    pub asset: TAddress,
    /// Recipient or facilitator-escrow address.
    pub pay_to: TAddress,
    /// Payment amount in atomic units, as a decimal string on the wire.
    pub amount: TAmount,
    /// Authorization validity window in seconds.
    pub max_timeout_seconds: u64,
    /// Scheme-specific extra data (EIP-712 domain, split recipients, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<TExtra>,
}

impl PaymentRequirements {
    /// Narrows the wire representation to concrete types.
    ///
    /// Returns `None` if any field fails to parse. A present but
    /// malformed `extra` also yields `None` so mechanisms reject rather
    /// than silently ignore it.
    #[must_use]
    pub fn as_concrete<TScheme, TAmount, TAddress, TExtra>(
        &self,
    ) -> Option<PaymentRequirements<TScheme, TAmount, TAddress, TExtra>>
    where
        TScheme: FromStr,
        TAmount: FromStr,
        TAddress: FromStr,
        TExtra: DeserializeOwned,
    {
        let scheme = self.scheme.parse::<TScheme>().ok()?;
        let amount = self.amount.parse::<TAmount>().ok()?;
        let pay_to = self.pay_to.parse::<TAddress>().ok()?;
        let asset = self.asset.parse::<TAddress>().ok()?;
        let extra = match &self.extra {
            None => None,
            Some(value) => Some(serde_json::from_value(value.clone()).ok()?),
        };
        Some(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            asset,
            pay_to,
            amount,
            max_timeout_seconds: self.max_timeout_seconds,
            extra,
        })
    }
}

/// A signed payment authorization from the client.
///
/// The `payload` field is chain-specific: an EIP-3009 authorization plus
/// signature on EVM, a base64 XDR transaction envelope on Stellar, a
/// base64 versioned transaction on Solana. On the wire it may be either
/// an inline object or a JSON string; use
/// [`PaymentPayload::decode_payload`] to obtain the typed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = serde_json::Value> {
    /// Protocol version, always `2`.
    pub x402_version: X402Version2,
    /// The payment scheme; must match the requirements.
    pub scheme: String,
    /// The CAIP-2 chain ID; must match the requirements.
    pub network: ChainId,
    /// The chain-specific signed payload.
    pub payload: TPayload,
}

impl PaymentPayload {
    /// Decodes the chain-specific payload into a concrete type.
    ///
    /// Accepts both an inline JSON object and a JSON-encoded string, as
    /// both occur on the wire.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error if the payload does not match
    /// the expected shape.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.payload {
            serde_json::Value::String(inner) => serde_json::from_str(inner),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// The envelope returned when payment is missing or invalid.
///
/// Carried in an HTTP 402 body or, over MCP, in an error result's
/// `structuredContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version, always `2`.
    pub x402_version: X402Version2,
    /// Acceptable payment methods, in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Free-form error message when a prior payment attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Metadata about the resource being paid for.
    pub resource: ResourceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("eip155", "84532"),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            amount: "1000".into(),
            max_timeout_seconds: 60,
            extra: Some(serde_json::json!({"name": "USDC", "version": "2"})),
        }
    }

    #[test]
    fn requirements_json_round_trip_is_identity() {
        let reqs = requirements();
        let json = serde_json::to_value(&reqs).unwrap();
        assert_eq!(json["payTo"], reqs.pay_to);
        assert_eq!(json["maxTimeoutSeconds"], 60);
        let back: PaymentRequirements = serde_json::from_value(json).unwrap();
        assert_eq!(back, reqs);
    }

    #[test]
    fn payload_version_gate() {
        let bad = serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "eip155:84532",
            "payload": {},
        });
        assert!(serde_json::from_value::<PaymentPayload>(bad).is_err());
    }

    #[test]
    fn payload_decodes_inline_object_and_string_form() {
        #[derive(Deserialize)]
        struct Inner {
            transaction: String,
        }

        let inline = PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("stellar", "testnet"),
            payload: serde_json::json!({"transaction": "AAAA"}),
        };
        assert_eq!(inline.decode_payload::<Inner>().unwrap().transaction, "AAAA");

        let stringly = PaymentPayload {
            payload: serde_json::Value::String("{\"transaction\":\"BBBB\"}".into()),
            ..inline
        };
        assert_eq!(
            stringly.decode_payload::<Inner>().unwrap().transaction,
            "BBBB"
        );
    }
}
