//! Wire types for the Solana schemes.

use serde::{Deserialize, Serialize};

/// Companion data of a Solana payment payload.
///
/// Everything here is derivable from the transaction; it is carried so
/// facilitators and dashboards can inspect the payment without decoding
/// the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaPayloadExtra {
    /// The payer (transfer authority).
    pub payer: String,
    /// Transfer amount in atomic units, as a decimal string.
    pub amount: String,
    /// The SPL token mint.
    pub mint: String,
    /// Source associated token account.
    pub source_ata: String,
    /// Destination associated token account.
    pub destination_ata: String,
}

/// The Solana payment payload: a partially-signed versioned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaPayload {
    /// Base64 of the bincode-serialized `VersionedTransaction`.
    pub transaction: String,
    /// Companion data, if the client attached it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<SolanaPayloadExtra>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_round_trip_is_identity() {
        let payload = SolanaPayload {
            transaction: "AQID".into(),
            extra: Some(SolanaPayloadExtra {
                payer: "payer".into(),
                amount: "1000".into(),
                mint: "mint".into(),
                source_ata: "source".into(),
                destination_ata: "dest".into(),
            }),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["extra"]["sourceAta"], "source");
        let back: SolanaPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
