//! Wire types for the Stellar schemes.

use serde::{Deserialize, Serialize};

/// The Stellar payment payload: a signed transaction envelope as base64
/// XDR.
///
/// On the wire this may arrive either as `{"transaction": "<xdr>"}` or
/// as the bare XDR string; [`crate::exact::StellarExactFacilitator`]
/// accepts both via [`ExactStellarPayload::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactStellarPayload {
    /// Base64 XDR of the signed `TransactionEnvelope`.
    pub transaction: String,
}

impl ExactStellarPayload {
    /// Parses the payload from its wire representation, accepting both
    /// the object form and a bare XDR string.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(transaction) => Some(Self {
                transaction: transaction.clone(),
            }),
            serde_json::Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_is_identity() {
        let payload = ExactStellarPayload {
            transaction: "AAAAAgAAAAB=".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"transaction": "AAAAAgAAAAB="}));
        let back: ExactStellarPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn from_value_accepts_both_forms() {
        let object = serde_json::json!({"transaction": "AAAA"});
        assert_eq!(
            ExactStellarPayload::from_value(&object).unwrap().transaction,
            "AAAA"
        );
        let bare = serde_json::json!("BBBB");
        assert_eq!(
            ExactStellarPayload::from_value(&bare).unwrap().transaction,
            "BBBB"
        );
        assert!(ExactStellarPayload::from_value(&serde_json::json!(42)).is_none());
    }
}
