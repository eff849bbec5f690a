//! Framework-agnostic MCP tool-call shapes.

use serde::{Deserialize, Serialize};

/// One content item of a tool result. Only text content matters to the
/// payment layer; other kinds pass through untouched as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    /// A text content item.
    Text {
        /// Always `"text"`.
        #[serde(rename = "type")]
        kind: String,
        /// The text payload.
        text: String,
    },
    /// Any other content kind.
    Other(serde_json::Value),
}

impl ContentItem {
    /// Creates a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            kind: "text".into(),
            text: text.into(),
        }
    }

    /// The text of this item, if it is text content.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Other(_) => None,
        }
    }
}

/// Parameters of an MCP `tools/call` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolParams {
    /// The tool name.
    pub name: String,
    /// The tool arguments.
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
    /// Request-level `_meta`, carrying the payment payload when present.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Result of an MCP `tools/call`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// The content items of the result.
    #[serde(default)]
    pub content: Vec<ContentItem>,
    /// Whether the result is a tool-level error.
    #[serde(default)]
    pub is_error: bool,
    /// Structured result payload, if the tool produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    /// Result-level `_meta`, carrying the settlement receipt when a
    /// payment was made.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Per-call execution context handed to gated tool handlers.
///
/// The transport builds this from the incoming request's `_meta`; the
/// payment layer reads the payment payload out of it. Handlers receive
/// it explicitly; there is no framework-level context injection.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// The request-level `_meta` of the current call.
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ExecutionContext {
    /// Creates a context from a request's `_meta` map.
    #[must_use]
    pub const fn new(meta: Option<serde_json::Map<String, serde_json::Value>>) -> Self {
        Self { meta }
    }

    /// Looks up a metadata value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.meta.as_ref()?.get(key)
    }
}

/// Result of a paid tool call, as seen by client code.
#[derive(Debug, Clone)]
pub struct PaidToolCallResult {
    /// The content items of the final result.
    pub content: Vec<ContentItem>,
    /// Whether the final result is an error.
    pub is_error: bool,
    /// The settlement receipt, when a payment was made and settled.
    pub payment_response: Option<x402::proto::SettleResponse>,
    /// Whether a payment was attached during this call.
    pub payment_made: bool,
    /// The raw final result, for callers needing full fidelity.
    pub raw_result: CallToolResult,
}
