//! Resource server role core.
//!
//! A resource server owns two jobs: building [`PaymentRequirements`] from
//! its operator's [`ResourceConfig`] (delegating price parsing and
//! enrichment to the registered server halves), and gating resource
//! execution behind the verify → execute → settle sequence against a
//! facilitator. The gate here is transport-neutral; `x402-mcp` and HTTP
//! integrations adapt its outcome to their native shapes.

use std::future::Future;
use std::sync::Arc;

use crate::chain::ChainId;
use crate::facilitator::Facilitator;
use crate::proto::v2::{PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo, V2};
use crate::proto::{SettleResponse, VerifyResponse};
use crate::amount::Price;
use crate::scheme::{SchemeRegistry, SchemeServer, ServerError};

/// Operator configuration for one paid resource.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// The payment scheme to demand (`exact` or `split`).
    pub scheme: String,
    /// The network to settle on.
    pub network: ChainId,
    /// Recipient (or facilitator-escrow) address.
    pub pay_to: String,
    /// The price of the resource.
    pub price: Price,
    /// Authorization validity window in seconds.
    pub max_timeout_seconds: u64,
    /// Scheme-specific extra data (e.g. `recipients` for `split`).
    pub extra: Option<serde_json::Value>,
}

/// Outcome of gating one request behind payment.
#[derive(Debug)]
pub enum PaymentGateOutcome<T, E> {
    /// No or bad payment: answer with this envelope (402 or MCP error).
    PaymentRequired(Box<PaymentRequired>),
    /// The handler itself failed; nothing was settled and the client is
    /// not charged.
    HandlerFailed(E),
    /// The handler succeeded but settlement failed; the resource is NOT
    /// delivered and the response explains why.
    SettlementFailed(Box<SettleResponse>),
    /// Payment settled; deliver the value with settlement metadata.
    Completed {
        /// The handler's result.
        value: T,
        /// The settlement receipt to attach to the response.
        settlement: Box<SettleResponse>,
    },
}

/// The resource server role core.
pub struct ResourceServer {
    servers: SchemeRegistry<Arc<dyn SchemeServer>>,
    facilitator: Arc<dyn Facilitator>,
}

impl std::fmt::Debug for ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceServer")
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}

impl ResourceServer {
    /// Creates a resource server over registered server halves and a
    /// facilitator (local or remote).
    #[must_use]
    pub const fn new(
        servers: SchemeRegistry<Arc<dyn SchemeServer>>,
        facilitator: Arc<dyn Facilitator>,
    ) -> Self {
        Self {
            servers,
            facilitator,
        }
    }

    /// The facilitator this server verifies and settles against.
    #[must_use]
    pub fn facilitator(&self) -> Arc<dyn Facilitator> {
        Arc::clone(&self.facilitator)
    }

    /// Builds complete payment requirements from operator configuration.
    ///
    /// Requirements are emergent: rebuilt per request, never persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when no mechanism serves the configured
    /// `(scheme, network)` or the price/extras are invalid.
    pub fn build_requirements(
        &self,
        config: &ResourceConfig,
    ) -> Result<PaymentRequirements, ServerError> {
        let half = self.servers.resolve(&config.scheme, &config.network)?;
        let asset_amount = half.parse_price(&config.price, &config.network)?;

        let mut extra = config.extra.clone();
        if let Some(price_extra) = asset_amount.extra {
            // Price-level extras (EIP-712 domain etc.) seed the map;
            // operator extras win on conflict.
            let mut merged = match price_extra {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            if let Some(serde_json::Value::Object(operator)) = extra.take() {
                merged.extend(operator);
            }
            extra = Some(serde_json::Value::Object(merged));
        }

        let requirements = PaymentRequirements {
            scheme: config.scheme.clone(),
            network: config.network.clone(),
            asset: asset_amount.asset,
            pay_to: config.pay_to.clone(),
            amount: asset_amount.amount,
            max_timeout_seconds: config.max_timeout_seconds,
            extra,
        };
        half.enhance_requirements(requirements)
    }

    /// Builds the payment-required envelope for the given requirements.
    #[must_use]
    pub fn payment_required(
        accepts: Vec<PaymentRequirements>,
        resource: ResourceInfo,
        error: Option<String>,
    ) -> PaymentRequired {
        PaymentRequired {
            x402_version: V2,
            accepts,
            error,
            resource,
        }
    }

    /// Gates a handler behind the verify → execute → settle sequence.
    ///
    /// - Missing or invalid payment yields a fresh
    ///   [`PaymentGateOutcome::PaymentRequired`] envelope (retry
    ///   possible, per the protocol's recoverable-failure rule).
    /// - The handler runs only after successful verification.
    /// - Settlement failure withholds the resource and yields the
    ///   failure response with its transaction hash when one exists.
    pub async fn gate<T, E, F, Fut>(
        &self,
        payment: Option<&PaymentPayload>,
        requirements: &PaymentRequirements,
        resource: &ResourceInfo,
        handler: F,
    ) -> PaymentGateOutcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let envelope = |error: String| {
            PaymentGateOutcome::PaymentRequired(Box::new(Self::payment_required(
                vec![requirements.clone()],
                resource.clone(),
                Some(error),
            )))
        };

        let Some(payload) = payment else {
            return envelope("Payment required".into());
        };

        let verification = match self.facilitator.verify(payload, requirements).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "payment verification unavailable");
                return envelope(format!("payment verification unavailable: {e}"));
            }
        };
        let payer = match verification {
            VerifyResponse::Valid { payer } => payer,
            VerifyResponse::Invalid { reason, .. } => {
                tracing::debug!(reason = %reason, "payment rejected");
                return envelope(reason);
            }
        };

        let value = match handler().await {
            Ok(value) => value,
            Err(e) => return PaymentGateOutcome::HandlerFailed(e),
        };

        let settlement = match self.facilitator.settle(payload, requirements).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, payer = %payer, "settlement transport failure");
                SettleResponse::failed("", requirements.network.to_string(), payer, e.to_string())
            }
        };

        if settlement.success {
            PaymentGateOutcome::Completed {
                value,
                settlement: Box::new(settlement),
            }
        } else {
            PaymentGateOutcome::SettlementFailed(Box::new(settlement))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{AssetAmount, parse_money};
    use crate::chain::ChainIdPattern;
    use crate::facilitator::FacilitatorError;
    use crate::proto::SupportedResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct UsdcServer;

    impl SchemeServer for UsdcServer {
        fn scheme(&self) -> &'static str {
            "exact"
        }

        fn namespace(&self) -> &'static str {
            "eip155"
        }

        fn parse_price(
            &self,
            price: &Price,
            _network: &ChainId,
        ) -> Result<AssetAmount, ServerError> {
            match price {
                Price::Money(text) => Ok(AssetAmount {
                    amount: parse_money(text, 6)
                        .map_err(|e| ServerError::InvalidPrice(e.to_string()))?,
                    asset: "0xUSDC".into(),
                    extra: Some(serde_json::json!({"name": "USDC", "version": "2"})),
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

    struct ScriptedFacilitator {
        valid: bool,
        settle_ok: bool,
        settled: AtomicBool,
    }

    #[async_trait]
    impl Facilitator for ScriptedFacilitator {
        async fn verify(
            &self,
            _payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> Result<VerifyResponse, FacilitatorError> {
            Ok(if self.valid {
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
            self.settled.store(true, Ordering::SeqCst);
            Ok(if self.settle_ok {
                SettleResponse::settled("0xhash", requirements.network.to_string(), "0xPayer")
            } else {
                SettleResponse::failed(
                    "0xhash",
                    requirements.network.to_string(),
                    "0xPayer",
                    "reverted",
                )
            })
        }

        async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
            Ok(SupportedResponse::default())
        }
    }

    fn server(valid: bool, settle_ok: bool) -> ResourceServer {
        let mut servers: SchemeRegistry<Arc<dyn SchemeServer>> = SchemeRegistry::new();
        servers.register("exact", &ChainIdPattern::wildcard("eip155"), Arc::new(UsdcServer));
        ResourceServer::new(
            servers,
            Arc::new(ScriptedFacilitator {
                valid,
                settle_ok,
                settled: AtomicBool::new(false),
            }),
        )
    }

    fn config() -> ResourceConfig {
        ResourceConfig {
            scheme: "exact".into(),
            network: ChainId::new("eip155", "84532"),
            pay_to: "0xPayTo".into(),
            price: Price::from("$0.001"),
            max_timeout_seconds: 60,
            extra: None,
        }
    }

    fn resource() -> ResourceInfo {
        ResourceInfo {
            url: "https://example.com/weather".into(),
            description: "weather".into(),
            mime_type: "application/json".into(),
        }
    }

    fn payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("eip155", "84532"),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn build_requirements_converts_price_and_merges_extra() {
        let server = server(true, true);
        let requirements = server.build_requirements(&config()).unwrap();
        assert_eq!(requirements.amount, "1000");
        assert_eq!(requirements.asset, "0xUSDC");
        assert_eq!(requirements.extra.unwrap()["name"], "USDC");
    }

    #[test]
    fn build_requirements_rejects_unknown_scheme() {
        let server = server(true, true);
        let mut bad = config();
        bad.scheme = "split".into();
        assert!(matches!(
            server.build_requirements(&bad),
            Err(ServerError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn gate_without_payment_returns_envelope() {
        let server = server(true, true);
        let requirements = server.build_requirements(&config()).unwrap();
        let outcome: PaymentGateOutcome<(), String> = server
            .gate(None, &requirements, &resource(), || async { Ok(()) })
            .await;
        match outcome {
            PaymentGateOutcome::PaymentRequired(envelope) => {
                assert_eq!(envelope.accepts.len(), 1);
                assert!(envelope.error.is_some());
            }
            other => panic!("expected PaymentRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gate_rejected_payment_does_not_run_handler() {
        let server = server(false, true);
        let requirements = server.build_requirements(&config()).unwrap();
        let payload = payload();
        let outcome: PaymentGateOutcome<(), String> = server
            .gate(Some(&payload), &requirements, &resource(), || async {
                panic!("handler must not run")
            })
            .await;
        assert!(matches!(outcome, PaymentGateOutcome::PaymentRequired(_)));
    }

    #[tokio::test]
    async fn gate_withholds_resource_on_settlement_failure() {
        let server = server(true, false);
        let requirements = server.build_requirements(&config()).unwrap();
        let payload = payload();
        let outcome: PaymentGateOutcome<&str, String> = server
            .gate(Some(&payload), &requirements, &resource(), || async {
                Ok("secret")
            })
            .await;
        match outcome {
            PaymentGateOutcome::SettlementFailed(response) => {
                assert!(!response.success);
                assert_eq!(response.transaction, "0xhash");
            }
            other => panic!("expected SettlementFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gate_happy_path_delivers_with_settlement() {
        let server = server(true, true);
        let requirements = server.build_requirements(&config()).unwrap();
        let payload = payload();
        let outcome: PaymentGateOutcome<&str, String> = server
            .gate(Some(&payload), &requirements, &resource(), || async {
                Ok("content")
            })
            .await;
        match outcome {
            PaymentGateOutcome::Completed { value, settlement } => {
                assert_eq!(value, "content");
                assert!(settlement.success);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }
}
