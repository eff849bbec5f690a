//! Client-side mechanism half.

use async_trait::async_trait;

use crate::proto::v2::{PaymentPayload, PaymentRequirements};

/// Errors produced while building a payment payload.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// None of the offered requirements can be satisfied by the
    /// registered mechanisms.
    #[error("no matching payment option among the offered requirements")]
    NoMatchingRequirement,
    /// The requirements could not be narrowed to the mechanism's types.
    #[error("invalid payment requirements: {0}")]
    InvalidRequirements(String),
    /// Producing the signature failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// An RPC interaction needed to build the payload failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Payload serialization failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// The client half of a mechanism: turns accepted requirements into a
/// signed [`PaymentPayload`].
///
/// Building may suspend on RPC calls (e.g. Stellar simulation, Solana
/// blockhash fetch); signing itself is local.
#[async_trait]
pub trait SchemeClient: Send + Sync {
    /// The scheme this half implements.
    fn scheme(&self) -> &'static str;

    /// The CAIP-2 namespace this half serves (e.g. `eip155`).
    fn namespace(&self) -> &'static str;

    /// Returns `true` if this half can satisfy the given requirements.
    fn supports(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == self.scheme() && requirements.network.namespace() == self.namespace()
    }

    /// Builds and signs a payment payload for the given requirements.
    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError>;
}
