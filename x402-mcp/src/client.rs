//! Client-side MCP payment handling: the retry-with-payment dance.

use async_trait::async_trait;

use x402::client::X402Client;

use crate::error::McpPaymentError;
use crate::extract;
use crate::types::{CallToolParams, CallToolResult, PaidToolCallResult};

/// Abstracts the MCP tool-call capability of an SDK session.
///
/// Implement this for whatever MCP client library is in use; the
/// implementation forwards `call_tool` to the live session.
#[async_trait]
pub trait McpCaller: Send + Sync {
    /// Issues one `tools/call` request.
    async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, McpPaymentError>;
}

/// An MCP session wrapper with automatic x402 payment handling.
///
/// Wraps any [`McpCaller`] and an [`X402Client`] role core. When a tool
/// answers with a payment-required error, the session builds a payment,
/// reissues the call with the payment in `_meta`, and surfaces the
/// settlement receipt from the response metadata.
pub struct X402McpSession<C> {
    caller: C,
    client: X402Client,
    auto_payment: bool,
}

impl<C> std::fmt::Debug for X402McpSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402McpSession")
            .field("auto_payment", &self.auto_payment)
            .finish_non_exhaustive()
    }
}

impl<C: McpCaller> X402McpSession<C> {
    /// Wraps an MCP caller with the given payment client.
    #[must_use]
    pub const fn new(caller: C, client: X402Client) -> Self {
        Self {
            caller,
            client,
            auto_payment: true,
        }
    }

    /// Disables automatic payment: payment-required responses surface as
    /// [`McpPaymentError::PaymentRequired`] instead of being paid.
    #[must_use]
    pub const fn with_auto_payment(mut self, enabled: bool) -> Self {
        self.auto_payment = enabled;
        self
    }

    /// The wrapped caller.
    pub const fn caller(&self) -> &C {
        &self.caller
    }

    /// Calls a tool, paying transparently when the server demands it.
    ///
    /// # Errors
    ///
    /// Returns [`McpPaymentError`] when the transport fails, payment
    /// creation fails, or auto-payment is disabled and payment was
    /// demanded.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<PaidToolCallResult, McpPaymentError> {
        let params = CallToolParams {
            name: name.to_owned(),
            arguments: arguments.clone(),
            meta: None,
        };
        let result = self.caller.call_tool(params).await?;

        if !result.is_error {
            return Ok(build_paid_result(result, false));
        }

        let Some(payment_required) = extract::payment_required_from_result(&result) else {
            // An ordinary tool error, not a payment demand.
            return Ok(build_paid_result(result, false));
        };
        if payment_required.accepts.is_empty() {
            return Ok(build_paid_result(result, false));
        }

        if !self.auto_payment {
            return Err(McpPaymentError::PaymentRequired(Box::new(payment_required)));
        }

        tracing::debug!(tool = name, "payment required, building payment");
        let payload = self.client.build_payment(&payment_required).await?;
        let payload_value = serde_json::to_value(&payload)?;

        let retry = CallToolParams {
            name: name.to_owned(),
            arguments,
            meta: Some(extract::attach_payment_to_meta(None, &payload_value)),
        };
        let result = self.caller.call_tool(retry).await?;
        Ok(build_paid_result(result, true))
    }
}

fn build_paid_result(result: CallToolResult, payment_made: bool) -> PaidToolCallResult {
    let payment_response = result
        .meta
        .as_ref()
        .and_then(extract::payment_response_from_meta);
    PaidToolCallResult {
        content: result.content.clone(),
        is_error: result.is_error,
        payment_response,
        payment_made,
        raw_result: result,
    }
}
