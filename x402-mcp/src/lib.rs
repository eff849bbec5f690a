//! MCP (Model Context Protocol) integration for the x402 protocol.
//!
//! Enables paid tool calls: servers wrap tool handlers with a payment
//! gate, clients wrap their MCP session with the retry-with-payment
//! dance. The crate is framework-agnostic: everything is expressed over
//! [`serde_json::Value`]-shaped tool calls, so it plugs into any MCP SDK.
//!
//! # Client flow
//!
//! 1. Call the tool without payment.
//! 2. If the result is an error carrying a `PaymentRequired` envelope
//!    (in `structuredContent` or parseable body text), build a payment
//!    via the [`x402::client::X402Client`] role core.
//! 3. Reissue the call with the payment under the
//!    [`PAYMENT_META_KEY`] metadata key.
//! 4. Surface the [`SettleResponse`](x402::proto::SettleResponse) found
//!    under [`PAYMENT_RESPONSE_META_KEY`] on the result.
//!
//! # Server flow
//!
//! [`server::McpPaymentGate`] receives the call-level metadata
//! explicitly through an [`types::ExecutionContext`]; handlers take it
//! as an argument; there is no decorator signature rewriting.

pub mod client;
pub mod error;
pub mod extract;
pub mod server;
pub mod types;

/// MCP `_meta` key under which the client sends its payment payload.
pub const PAYMENT_META_KEY: &str = "x402/payment-required-payment";

/// MCP `_meta` key under which the server returns the settlement
/// receipt.
pub const PAYMENT_RESPONSE_META_KEY: &str = "x402/payment-response";
