//! Client role core.
//!
//! [`X402Client`] is a stateless helper: given a
//! [`PaymentRequired`](crate::proto::v2::PaymentRequired) envelope it
//! finds a registered mechanism that can satisfy one of the offered
//! requirements and returns the signed payload. Transport wrappers (MCP
//! session, HTTP middleware) own the retry dance and delegate here.

use std::sync::Arc;

use crate::proto::v2::{PaymentPayload, PaymentRequired, PaymentRequirements};
use crate::scheme::{ClientError, SchemeClient};

/// Strategy for choosing among multiple satisfiable requirements.
pub trait PaymentSelector: Send + Sync {
    /// Picks one requirement out of the candidates, or `None` to decline
    /// all of them.
    fn select<'a>(&self, candidates: &[&'a PaymentRequirements])
    -> Option<&'a PaymentRequirements>;
}

/// Picks the first candidate, preserving the server's preference order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(
        &self,
        candidates: &[&'a PaymentRequirements],
    ) -> Option<&'a PaymentRequirements> {
        candidates.first().copied()
    }
}

/// The client role core.
///
/// Holds the registered client mechanism halves and a selection strategy.
pub struct X402Client {
    clients: Vec<Arc<dyn SchemeClient>>,
    selector: Box<dyn PaymentSelector>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl Default for X402Client {
    fn default() -> Self {
        Self::new()
    }
}

impl X402Client {
    /// Creates a client with no mechanisms and the [`FirstMatch`]
    /// selector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            selector: Box::new(FirstMatch),
        }
    }

    /// Registers a client mechanism half.
    #[must_use]
    pub fn with_scheme(mut self, client: Arc<dyn SchemeClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Replaces the selection strategy.
    #[must_use]
    pub fn with_selector(mut self, selector: Box<dyn PaymentSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Builds a signed payment for one of the offered requirements.
    ///
    /// Candidates are the `accepts` entries some registered mechanism
    /// supports; the selector picks among them and the owning mechanism
    /// signs.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoMatchingRequirement`] when nothing is buildable,
    /// or the mechanism's build error.
    pub async fn build_payment(
        &self,
        required: &PaymentRequired,
    ) -> Result<PaymentPayload, ClientError> {
        let candidates: Vec<&PaymentRequirements> = required
            .accepts
            .iter()
            .filter(|requirements| self.clients.iter().any(|c| c.supports(requirements)))
            .collect();

        let selected = self
            .selector
            .select(&candidates)
            .ok_or(ClientError::NoMatchingRequirement)?;

        let client = self
            .clients
            .iter()
            .find(|c| c.supports(selected))
            .ok_or(ClientError::NoMatchingRequirement)?;

        client.build_payload(selected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainId;
    use crate::proto::v2::{ResourceInfo, V2};
    use async_trait::async_trait;

    struct StubClient {
        scheme: &'static str,
        namespace: &'static str,
    }

    #[async_trait]
    impl SchemeClient for StubClient {
        fn scheme(&self) -> &'static str {
            self.scheme
        }

        fn namespace(&self) -> &'static str {
            self.namespace
        }

        async fn build_payload(
            &self,
            requirements: &PaymentRequirements,
        ) -> Result<PaymentPayload, ClientError> {
            Ok(PaymentPayload {
                x402_version: V2,
                scheme: requirements.scheme.clone(),
                network: requirements.network.clone(),
                payload: serde_json::json!({"stub": true}),
            })
        }
    }

    fn required(accepts: Vec<PaymentRequirements>) -> PaymentRequired {
        PaymentRequired {
            x402_version: V2,
            accepts,
            error: None,
            resource: ResourceInfo {
                url: "https://example.com/data".into(),
                description: "data".into(),
                mime_type: "application/json".into(),
            },
        }
    }

    fn requirements(scheme: &str, namespace: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: scheme.into(),
            network: ChainId::new(namespace, "1"),
            asset: "asset".into(),
            pay_to: "payto".into(),
            amount: "1".into(),
            max_timeout_seconds: 60,
            extra: None,
        }
    }

    #[tokio::test]
    async fn picks_first_supported_requirement() {
        let client = X402Client::new().with_scheme(Arc::new(StubClient {
            scheme: "exact",
            namespace: "solana",
        }));

        // First entry is unsupported (no stellar mechanism registered),
        // second is buildable.
        let required = required(vec![
            requirements("exact", "stellar"),
            requirements("exact", "solana"),
        ]);

        let payload = client.build_payment(&required).await.unwrap();
        assert_eq!(payload.network.namespace(), "solana");
    }

    #[tokio::test]
    async fn errors_when_nothing_matches() {
        let client = X402Client::new().with_scheme(Arc::new(StubClient {
            scheme: "exact",
            namespace: "eip155",
        }));
        let required = required(vec![requirements("split", "eip155")]);
        let err = client.build_payment(&required).await.unwrap_err();
        assert!(matches!(err, ClientError::NoMatchingRequirement));
    }
}
