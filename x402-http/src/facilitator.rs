//! HTTP client for a remote facilitator.
//!
//! Implements the core [`Facilitator`] trait over the facilitator's
//! JSON API, so resource servers can swap a local dispatcher for a
//! remote service without touching the payment gate.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use x402::facilitator::{Facilitator, FacilitatorError};
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Default timeout for facilitator calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A remote facilitator reachable over HTTP.
///
/// Cheap to clone and safe for concurrent use.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FacilitatorClient {
    /// Creates a client for a facilitator at `base_url` (e.g. the value
    /// of the `FACILITATOR_URL` environment variable).
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError::Transport`] if the HTTP client cannot
    /// be built.
    pub fn new(base_url: Url) -> Result<Self, FacilitatorError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FacilitatorError> {
        self.base_url
            .join(path)
            .map_err(|e| FacilitatorError::Transport(e.to_string()))
    }

    async fn post<R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &VerifyRequest,
    ) -> Result<R, FacilitatorError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::Transport(format!(
                "facilitator returned {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let request = VerifyRequest {
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };
        self.post("verify", &request).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let request = VerifyRequest {
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };
        self.post("settle", &request).await
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        let url = self.endpoint("supported")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FacilitatorError::Transport(format!(
                "facilitator returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Malformed(e.to_string()))
    }
}
