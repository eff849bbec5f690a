//! The facilitator role: verify and settle payments on behalf of
//! resource servers.
//!
//! [`Facilitator`] is the unified interface implemented both by the local
//! dispatcher in this module and by the HTTP client in `x402-http`, so a
//! resource server does not care whether settlement happens in-process or
//! behind a `POST /settle`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::proto::v2::{PaymentPayload, PaymentRequirements};
use crate::proto::{SettleResponse, SupportedPaymentKind, SupportedResponse, VerifyResponse, v2};
use crate::scheme::{SchemeFacilitator, SchemeRegistry};

/// Errors that prevented a facilitator from producing an answer.
///
/// Payload-level problems are NOT errors; they come back inside
/// [`VerifyResponse`] / [`SettleResponse`]. These variants cover the
/// transport and configuration faults around them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FacilitatorError {
    /// The request body could not be interpreted at all.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// An HTTP or RPC transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Any other fault.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// The asynchronous facilitator interface.
///
/// Dyn-compatible so heterogeneous implementations (local dispatcher,
/// remote HTTP client) can be stored as `Arc<dyn Facilitator>`.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Verifies a payment payload against payment requirements.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError>;

    /// Settles a verified payment on-chain.
    ///
    /// Settlement re-verifies internally; callers need not call
    /// [`Facilitator::verify`] first for safety (only to fail fast).
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;

    /// Returns the payment kinds this facilitator supports.
    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError>;
}

#[async_trait]
impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.as_ref().verify(payload, requirements).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.as_ref().settle(payload, requirements).await
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        self.as_ref().supported().await
    }
}

/// A local facilitator that dispatches into a mechanism registry.
///
/// Requests are routed by the payload's `(scheme, network)`; resolution
/// misses surface as `unsupported_scheme` / `unsupported_network` verify
/// failures rather than errors, since a client can recover by picking a
/// different payment option.
pub struct FacilitatorLocal {
    registry: SchemeRegistry<Arc<dyn SchemeFacilitator>>,
}

impl std::fmt::Debug for FacilitatorLocal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorLocal")
            .field("registry", &self.registry)
            .finish()
    }
}

impl FacilitatorLocal {
    /// Creates a facilitator over the given mechanism registry.
    #[must_use]
    pub const fn new(registry: SchemeRegistry<Arc<dyn SchemeFacilitator>>) -> Self {
        Self { registry }
    }

    /// The underlying mechanism registry.
    #[must_use]
    pub const fn registry(&self) -> &SchemeRegistry<Arc<dyn SchemeFacilitator>> {
        &self.registry
    }
}

#[async_trait]
impl Facilitator for FacilitatorLocal {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        match self.registry.resolve(&payload.scheme, &payload.network) {
            Ok(mechanism) => mechanism.verify(payload, requirements).await,
            Err(miss) => {
                tracing::debug!(scheme = %payload.scheme, network = %payload.network, "no mechanism for payment");
                Ok(VerifyResponse::invalid(miss.reason(), None))
            }
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        match self.registry.resolve(&payload.scheme, &payload.network) {
            Ok(mechanism) => mechanism.settle(payload, requirements).await,
            Err(miss) => Ok(SettleResponse::failed(
                "",
                payload.network.to_string(),
                "",
                miss.reason(),
            )),
        }
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        let mut response = SupportedResponse::default();
        for (key, mechanism) in self.registry.entries() {
            response.kinds.push(SupportedPaymentKind {
                x402_version: v2::X402Version2::VALUE,
                scheme: key.scheme.clone(),
                network: key.chain_id.to_string(),
                extra: mechanism.extra(),
            });
            response
                .signers
                .entry(key.chain_id.to_string())
                .or_insert_with(|| mechanism.signers());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainId, ChainIdPattern};
    use crate::proto::v2::V2;

    struct AlwaysValid;

    #[async_trait]
    impl SchemeFacilitator for AlwaysValid {
        async fn verify(
            &self,
            _payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> Result<VerifyResponse, FacilitatorError> {
            Ok(VerifyResponse::valid("payer"))
        }

        async fn settle(
            &self,
            payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> Result<SettleResponse, FacilitatorError> {
            Ok(SettleResponse::settled(
                "0xhash",
                payload.network.to_string(),
                "payer",
            ))
        }

        fn signers(&self) -> Vec<String> {
            vec!["0xSigner".into()]
        }
    }

    fn payload(scheme: &str, network: ChainId) -> PaymentPayload {
        PaymentPayload {
            x402_version: V2,
            scheme: scheme.into(),
            network,
            payload: serde_json::Value::Null,
        }
    }

    fn requirements(scheme: &str, network: ChainId) -> PaymentRequirements {
        PaymentRequirements {
            scheme: scheme.into(),
            network,
            asset: "asset".into(),
            pay_to: "payto".into(),
            amount: "1".into(),
            max_timeout_seconds: 60,
            extra: None,
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_mechanism() {
        let mut registry: SchemeRegistry<Arc<dyn SchemeFacilitator>> = SchemeRegistry::new();
        registry.register(
            "exact",
            &ChainIdPattern::wildcard("eip155"),
            Arc::new(AlwaysValid),
        );
        let facilitator = FacilitatorLocal::new(registry);

        let network = ChainId::new("eip155", "84532");
        let response = facilitator
            .verify(
                &payload("exact", network.clone()),
                &requirements("exact", network),
            )
            .await
            .unwrap();
        assert!(response.is_valid());
    }

    #[tokio::test]
    async fn misses_surface_as_invalid_not_err() {
        let facilitator = FacilitatorLocal::new(SchemeRegistry::new());
        let network = ChainId::new("eip155", "84532");
        let response = facilitator
            .verify(
                &payload("exact", network.clone()),
                &requirements("exact", network.clone()),
            )
            .await
            .unwrap();
        assert_eq!(
            response,
            VerifyResponse::invalid("unsupported_scheme", None)
        );

        let settle = facilitator
            .settle(
                &payload("exact", network.clone()),
                &requirements("exact", network),
            )
            .await
            .unwrap();
        assert!(!settle.success);
        assert_eq!(settle.error(), Some("unsupported_scheme"));
    }

    #[tokio::test]
    async fn supported_lists_kinds_and_signers() {
        let mut registry: SchemeRegistry<Arc<dyn SchemeFacilitator>> = SchemeRegistry::new();
        registry.register(
            "exact",
            &ChainIdPattern::wildcard("eip155"),
            Arc::new(AlwaysValid),
        );
        let facilitator = FacilitatorLocal::new(registry);
        let supported = facilitator.supported().await.unwrap();
        assert_eq!(supported.kinds.len(), 1);
        assert_eq!(supported.kinds[0].network, "eip155:*");
        assert_eq!(supported.signers["eip155:*"], vec!["0xSigner"]);
    }
}
