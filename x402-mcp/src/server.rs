//! Server-side MCP payment gate.
//!
//! Wraps tool handlers with the verify → execute → settle sequence of
//! the resource-server role core. Handlers receive the per-call
//! [`ExecutionContext`] explicitly; the gate reads the payment payload
//! out of it and never touches handler signatures.

use std::future::Future;
use std::sync::Arc;

use x402::proto::v2::{PaymentRequirements, ResourceInfo};
use x402::server::{PaymentGateOutcome, ResourceServer};

use crate::PAYMENT_RESPONSE_META_KEY;
use crate::error::McpPaymentError;
use crate::extract;
use crate::types::{CallToolParams, CallToolResult, ContentItem, ExecutionContext};

/// A payment gate around MCP tool handlers.
///
/// One gate guards one priced resource (tool); the `accepts` list is
/// rebuilt by the caller per request or reused when static.
pub struct McpPaymentGate {
    server: Arc<ResourceServer>,
    accepts: Vec<PaymentRequirements>,
    resource: ResourceInfo,
}

impl std::fmt::Debug for McpPaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpPaymentGate")
            .field("accepts", &self.accepts.len())
            .field("resource", &self.resource.url)
            .finish_non_exhaustive()
    }
}

enum HandlerOutcome {
    /// The handler produced a tool-level error result; not settled.
    ToolError(CallToolResult),
    /// The handler itself failed.
    Failed(McpPaymentError),
}

impl McpPaymentGate {
    /// Creates a gate for one tool.
    ///
    /// # Panics
    ///
    /// Panics if `accepts` is empty; a gate with nothing to accept can
    /// never admit a request.
    #[must_use]
    pub fn new(
        server: Arc<ResourceServer>,
        accepts: Vec<PaymentRequirements>,
        resource: ResourceInfo,
    ) -> Self {
        assert!(
            !accepts.is_empty(),
            "McpPaymentGate requires at least one payment requirement"
        );
        Self {
            server,
            accepts,
            resource,
        }
    }

    /// Processes one tool call with payment enforcement.
    ///
    /// Payment failures follow the MCP convention of tool errors
    /// (`isError: true`) rather than transport errors, with the
    /// payment-required envelope embedded in both `structuredContent`
    /// and the text content.
    pub async fn process<H, Fut>(&self, params: CallToolParams, handler: H) -> CallToolResult
    where
        H: FnOnce(CallToolParams, ExecutionContext) -> Fut,
        Fut: Future<Output = Result<CallToolResult, McpPaymentError>>,
    {
        let ctx = ExecutionContext::new(params.meta.clone());
        let payment = extract::payment_from_context(&ctx);
        let requirements = &self.accepts[0];

        let outcome = self
            .server
            .gate(payment.as_ref(), requirements, &self.resource, || async move {
                match handler(params, ctx).await {
                    Ok(result) if result.is_error => Err(HandlerOutcome::ToolError(result)),
                    Ok(result) => Ok(result),
                    Err(e) => Err(HandlerOutcome::Failed(e)),
                }
            })
            .await;

        match outcome {
            PaymentGateOutcome::PaymentRequired(envelope) => payment_required_result(&envelope),
            PaymentGateOutcome::HandlerFailed(HandlerOutcome::ToolError(result)) => result,
            PaymentGateOutcome::HandlerFailed(HandlerOutcome::Failed(e)) => CallToolResult {
                content: vec![ContentItem::text(format!("tool execution error: {e}"))],
                is_error: true,
                ..Default::default()
            },
            PaymentGateOutcome::SettlementFailed(settlement) => {
                let mut meta = serde_json::Map::new();
                if let Ok(value) = serde_json::to_value(&*settlement) {
                    meta.insert(PAYMENT_RESPONSE_META_KEY.to_owned(), value);
                }
                CallToolResult {
                    content: vec![ContentItem::text(format!(
                        "payment settlement failed: {}",
                        settlement.error().unwrap_or("unknown")
                    ))],
                    is_error: true,
                    structured_content: None,
                    meta: Some(meta),
                }
            }
            PaymentGateOutcome::Completed { value, settlement } => {
                let mut result = value;
                let mut meta = result.meta.take().unwrap_or_default();
                if let Ok(settlement_value) = serde_json::to_value(&*settlement) {
                    meta.insert(PAYMENT_RESPONSE_META_KEY.to_owned(), settlement_value);
                }
                result.meta = Some(meta);
                result
            }
        }
    }
}

/// Renders a payment-required envelope as an MCP tool error: the JSON is
/// carried in `structuredContent` for well-behaved clients and mirrored
/// into the text content for clients that only see stringified errors.
fn payment_required_result(envelope: &x402::proto::v2::PaymentRequired) -> CallToolResult {
    let value = serde_json::to_value(envelope).unwrap_or_default();
    let text = serde_json::to_string(&value).unwrap_or_default();
    CallToolResult {
        content: vec![ContentItem::text(text)],
        is_error: true,
        structured_content: Some(value),
        meta: None,
    }
}
