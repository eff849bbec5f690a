//! Error types of the MCP payment layer.

use x402::proto::v2::PaymentRequired;

/// Errors from paid MCP tool calls.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum McpPaymentError {
    /// The underlying MCP transport failed.
    #[error("mcp transport error: {0}")]
    Transport(String),
    /// The server demands payment and auto-payment is disabled (or the
    /// payment was declined).
    #[error("payment required: {0:?}")]
    PaymentRequired(Box<PaymentRequired>),
    /// No registered mechanism can satisfy any offered requirement.
    #[error(transparent)]
    PaymentCreation(#[from] x402::scheme::ClientError),
    /// JSON (de)serialization failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
