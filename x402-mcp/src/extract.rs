//! Helpers for moving x402 data in and out of MCP messages.

use std::sync::LazyLock;

use regex::Regex;
use x402::proto::SettleResponse;
use x402::proto::v2::{PaymentPayload, PaymentRequired};

use crate::types::{CallToolResult, ExecutionContext};
use crate::{PAYMENT_META_KEY, PAYMENT_RESPONSE_META_KEY};

/// Extracts the payment payload from a call's execution context.
#[must_use]
pub fn payment_from_context(ctx: &ExecutionContext) -> Option<PaymentPayload> {
    let value = ctx.get(PAYMENT_META_KEY)?;
    serde_json::from_value(value.clone()).ok()
}

/// Attaches a payment payload to a request `_meta` map, creating the map
/// if needed.
#[must_use]
pub fn attach_payment_to_meta(
    meta: Option<serde_json::Map<String, serde_json::Value>>,
    payload: &serde_json::Value,
) -> serde_json::Map<String, serde_json::Value> {
    let mut meta = meta.unwrap_or_default();
    meta.insert(PAYMENT_META_KEY.to_owned(), payload.clone());
    meta
}

/// Extracts the settlement receipt from a result `_meta` map.
#[must_use]
pub fn payment_response_from_meta(
    meta: &serde_json::Map<String, serde_json::Value>,
) -> Option<SettleResponse> {
    let value = meta.get(PAYMENT_RESPONSE_META_KEY)?;
    serde_json::from_value(value.clone()).ok()
}

/// Matches an embedded `{... "accepts": [...] ...}` JSON object inside
/// framework-wrapped error text like
/// `Error executing tool get_weather: {...}`.
static EMBEDDED_ENVELOPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{.*"accepts"\s*:\s*\[.*\].*\}"#).expect("static regex")
});

/// Extracts a [`PaymentRequired`] envelope from an error result.
///
/// Prefers `structuredContent`; falls back to parsing each text content
/// item as JSON, directly or embedded in a framework error wrapper. A
/// candidate only counts when it has both `accepts` and `x402Version`
/// (and the version gate rejects anything but 2 during deserialization).
#[must_use]
pub fn payment_required_from_result(result: &CallToolResult) -> Option<PaymentRequired> {
    if let Some(structured) = &result.structured_content
        && let Some(envelope) = parse_envelope(structured)
    {
        return Some(envelope);
    }

    for item in &result.content {
        let Some(text) = item.as_text() else { continue };
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text)
            && let Some(envelope) = parse_envelope(&value)
        {
            return Some(envelope);
        }
        if let Some(found) = EMBEDDED_ENVELOPE.find(text)
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(found.as_str())
            && let Some(envelope) = parse_envelope(&value)
        {
            return Some(envelope);
        }
    }
    None
}

fn parse_envelope(value: &serde_json::Value) -> Option<PaymentRequired> {
    if value.get("accepts").is_none() || value.get("x402Version").is_none() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}
