//! The x402 payment headers.
//!
//! Payment payloads travel from client to server in `X-PAYMENT`, and
//! settlement receipts back in `X-PAYMENT-RESPONSE`. Both carry
//! base64-encoded JSON, byte-identical to the MCP metadata transport.

use serde::Serialize;
use serde::de::DeserializeOwned;
use x402::proto::Base64Bytes;
use x402::proto::v2::PaymentPayload;
use x402::proto::SettleResponse;

/// Request header carrying the signed payment payload.
pub const X_PAYMENT: &str = "X-PAYMENT";

/// Response header carrying the settlement receipt.
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Errors decoding a payment header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The header value is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not the expected JSON shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a wire value as a base64-JSON header value.
///
/// # Errors
///
/// Returns [`HeaderError::Json`] if serialization fails.
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(&json).to_string())
}

/// Decodes a base64-JSON header value.
///
/// # Errors
///
/// Returns [`HeaderError`] on bad base64 or mismatched JSON.
pub fn decode_header<T: DeserializeOwned>(value: &str) -> Result<T, HeaderError> {
    let bytes = Base64Bytes::from(value).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decodes an `X-PAYMENT` header into a payment payload.
///
/// # Errors
///
/// Returns [`HeaderError`] on malformed input, including a payload whose
/// `x402Version` is not 2.
pub fn decode_payment(value: &str) -> Result<PaymentPayload, HeaderError> {
    decode_header(value)
}

/// Encodes a settlement receipt for the `X-PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HeaderError::Json`] if serialization fails.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, HeaderError> {
    encode_header(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402::chain::ChainId;
    use x402::proto::v2::V2;

    #[test]
    fn payment_header_round_trip() {
        let payload = PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("eip155", "84532"),
            payload: serde_json::json!({"signature": "0xabc"}),
        };
        let header = encode_header(&payload).unwrap();
        let decoded = decode_payment(&header).unwrap();
        assert_eq!(decoded.scheme, "exact");
        assert_eq!(decoded.network, payload.network);
    }

    #[test]
    fn version_gate_applies_at_the_header_boundary() {
        let bad = serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "eip155:84532",
            "payload": {},
        });
        let header =
            x402::proto::Base64Bytes::encode(serde_json::to_vec(&bad).unwrap()).to_string();
        assert!(decode_payment(&header).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_payment("!!!not-base64!!!").is_err());
        let header = x402::proto::Base64Bytes::encode(b"not json").to_string();
        assert!(decode_payment(&header).is_err());
    }
}
