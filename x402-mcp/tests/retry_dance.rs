//! End-to-end exercise of the MCP payment flow: a tool call without
//! payment receives the payment-required envelope, the session builds a
//! payment and retries, and the settled result carries the receipt.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use x402::amount::{AssetAmount, Price, parse_money};
use x402::chain::{ChainId, ChainIdPattern};
use x402::client::X402Client;
use x402::facilitator::{Facilitator, FacilitatorError};
use x402::proto::v2::{PaymentPayload, PaymentRequirements, ResourceInfo, V2};
use x402::proto::{SettleResponse, SupportedResponse, VerifyResponse};
use x402::scheme::{ClientError, SchemeClient, SchemeRegistry, SchemeServer, ServerError};
use x402::server::{ResourceConfig, ResourceServer};

use x402_mcp::client::{McpCaller, X402McpSession};
use x402_mcp::error::McpPaymentError;
use x402_mcp::server::McpPaymentGate;
use x402_mcp::types::{CallToolParams, CallToolResult, ContentItem, ExecutionContext};

fn network() -> ChainId {
    ChainId::new("eip155", "84532")
}

/// Client half that "signs" by echoing a recognizable payload.
struct StubSchemeClient;

#[async_trait]
impl SchemeClient for StubSchemeClient {
    fn scheme(&self) -> &'static str {
        "exact"
    }

    fn namespace(&self) -> &'static str {
        "eip155"
    }

    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError> {
        Ok(PaymentPayload {
            x402_version: V2,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            payload: serde_json::json!({
                "signature": "0xstub",
                "amount": requirements.amount,
            }),
        })
    }
}

/// Server half pricing everything in test-USDC.
struct StubServerHalf;

impl SchemeServer for StubServerHalf {
    fn scheme(&self) -> &'static str {
        "exact"
    }

    fn namespace(&self) -> &'static str {
        "eip155"
    }

    fn parse_price(&self, price: &Price, _network: &ChainId) -> Result<AssetAmount, ServerError> {
        match price {
            Price::Money(text) => Ok(AssetAmount {
                amount: parse_money(text, 6)
                    .map_err(|e| ServerError::InvalidPrice(e.to_string()))?,
                asset: "0xUSDC".into(),
                extra: None,
            }),
            Price::Asset(asset) => Ok(asset.clone()),
        }
    }

    fn enhance_requirements(
        &self,
        requirements: PaymentRequirements,
    ) -> Result<PaymentRequirements, ServerError> {
        Ok(requirements)
    }
}

/// Facilitator accepting exactly the stub client's signature.
struct StubFacilitator {
    settles: AtomicUsize,
}

#[async_trait]
impl Facilitator for StubFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let ok = payload.scheme == requirements.scheme
            && payload.network == requirements.network
            && payload.payload.get("signature") == Some(&serde_json::json!("0xstub"));
        Ok(if ok {
            VerifyResponse::valid("0xPayer")
        } else {
            VerifyResponse::invalid("invalid_signature", None)
        })
    }

    async fn settle(
        &self,
        _payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.settles.fetch_add(1, Ordering::SeqCst);
        Ok(SettleResponse::settled(
            "0xfeedbeef",
            requirements.network.to_string(),
            "0xPayer",
        ))
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        Ok(SupportedResponse::default())
    }
}

/// An in-process "MCP server": routes tool calls through the payment
/// gate into the weather handler.
struct GatedWeatherServer {
    gate: McpPaymentGate,
}

#[async_trait]
impl McpCaller for GatedWeatherServer {
    async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, McpPaymentError> {
        Ok(self
            .gate
            .process(params, |params, _ctx: ExecutionContext| async move {
                let city = params
                    .arguments
                    .get("city")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("nowhere");
                Ok(CallToolResult {
                    content: vec![ContentItem::text(
                        serde_json::json!({"city": city, "weather": "sunny"}).to_string(),
                    )],
                    is_error: false,
                    ..Default::default()
                })
            })
            .await)
    }
}

fn gated_server(facilitator: Arc<StubFacilitator>) -> GatedWeatherServer {
    let mut halves: SchemeRegistry<Arc<dyn SchemeServer>> = SchemeRegistry::new();
    halves.register(
        "exact",
        &ChainIdPattern::wildcard("eip155"),
        Arc::new(StubServerHalf),
    );
    let server = Arc::new(ResourceServer::new(halves, facilitator));

    let accepts = vec![
        server
            .build_requirements(&ResourceConfig {
                scheme: "exact".into(),
                network: network(),
                pay_to: "0xPayTo".into(),
                price: Price::from("$0.001"),
                max_timeout_seconds: 60,
                extra: None,
            })
            .unwrap(),
    ];
    let resource = ResourceInfo {
        url: "mcp://tool/get_weather".into(),
        description: "Get current weather".into(),
        mime_type: "application/json".into(),
    };
    GatedWeatherServer {
        gate: McpPaymentGate::new(server, accepts, resource),
    }
}

#[tokio::test]
async fn retry_dance_pays_and_delivers() {
    let facilitator = Arc::new(StubFacilitator {
        settles: AtomicUsize::new(0),
    });
    let server = gated_server(Arc::clone(&facilitator));
    let session = X402McpSession::new(
        server,
        X402Client::new().with_scheme(Arc::new(StubSchemeClient)),
    );

    let mut arguments = serde_json::Map::new();
    arguments.insert("city".into(), serde_json::json!("SF"));
    let result = session.call_tool("get_weather", arguments).await.unwrap();

    assert!(!result.is_error);
    assert!(result.payment_made);
    let body = result.content[0].as_text().unwrap();
    assert!(body.contains("\"city\":\"SF\""), "body: {body}");

    let receipt = result.payment_response.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.transaction, "0xfeedbeef");
    assert_eq!(facilitator.settles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unpaid_call_surfaces_envelope_without_running_handler() {
    let facilitator = Arc::new(StubFacilitator {
        settles: AtomicUsize::new(0),
    });
    let server = gated_server(Arc::clone(&facilitator));

    // Call the gate directly, with no payment meta and no retry layer.
    let result = server
        .call_tool(CallToolParams {
            name: "get_weather".into(),
            arguments: serde_json::Map::new(),
            meta: None,
        })
        .await
        .unwrap();

    assert!(result.is_error);
    let envelope = result.structured_content.unwrap();
    assert_eq!(envelope["x402Version"], 2);
    assert_eq!(envelope["accepts"][0]["amount"], "1000");
    assert_eq!(facilitator.settles.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auto_payment_off_raises_payment_required() {
    let facilitator = Arc::new(StubFacilitator {
        settles: AtomicUsize::new(0),
    });
    let server = gated_server(facilitator);
    let session = X402McpSession::new(
        server,
        X402Client::new().with_scheme(Arc::new(StubSchemeClient)),
    )
    .with_auto_payment(false);

    let err = session
        .call_tool("get_weather", serde_json::Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, McpPaymentError::PaymentRequired(_)));
}
