//! Axum route handlers for the facilitator API.
//!
//! Request bodies are taken as raw JSON and decoded by hand: a payload
//! whose `x402Version` is not the supported version must come back as a
//! structured protocol failure (`invalidReason: "invalid_x402_version"`),
//! not as a framework-level deserialization rejection.

use std::sync::Arc;

use axum::extract::State;
use axum::{Json, Router, routing};

use x402::facilitator::{Facilitator, FacilitatorLocal};
use x402::proto::v2::X402Version2;
use x402::proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse, reason,
};

use crate::error::ApiError;

/// Shared application state.
pub type FacilitatorState = Arc<FacilitatorLocal>;

/// How a raw request body failed to decode.
enum RequestError {
    /// The payload's `x402Version` is not the supported version; a
    /// protocol failure, answered structurally.
    VersionMismatch,
    /// Anything else malformed; answered with a 400.
    Malformed(String),
}

/// Decodes a facilitator request body, separating the version gate from
/// ordinary malformed input.
fn decode_request<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
) -> Result<T, RequestError> {
    let version = value
        .get("paymentPayload")
        .and_then(|payload| payload.get("x402Version"))
        .and_then(serde_json::Value::as_u64);
    if let Some(version) = version
        && version != u64::from(X402Version2::VALUE)
    {
        return Err(RequestError::VersionMismatch);
    }
    serde_json::from_value(value.clone()).map_err(|e| RequestError::Malformed(e.to_string()))
}

/// The network named by the request's requirements, for failure
/// responses built before the body fully decoded.
fn requirements_network(value: &serde_json::Value) -> String {
    value
        .get("paymentRequirements")
        .and_then(|requirements| requirements.get("network"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// `POST /verify` - verifies a payment payload.
///
/// Payload-level problems, including a bad `x402Version`, come back as
/// `isValid: false` with a reason.
///
/// # Errors
///
/// Returns an [`ApiError`] on unparseable bodies and transport faults.
pub async fn post_verify(
    State(facilitator): State<FacilitatorState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request: VerifyRequest = match decode_request(&body) {
        Ok(request) => request,
        Err(RequestError::VersionMismatch) => {
            return Ok(Json(VerifyResponse::invalid(
                reason::INVALID_X402_VERSION,
                None,
            )));
        }
        Err(RequestError::Malformed(message)) => return Err(ApiError::bad_request(message)),
    };
    let response = facilitator
        .verify(&request.payment_payload, &request.payment_requirements)
        .await?;
    Ok(Json(response))
}

/// `POST /settle` - verifies and settles a payment on-chain.
///
/// Payload-level problems, including a bad `x402Version`, come back as
/// `success: false` with the reason under `extra.error`.
///
/// # Errors
///
/// Returns an [`ApiError`] on unparseable bodies and transport faults.
pub async fn post_settle(
    State(facilitator): State<FacilitatorState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SettleResponse>, ApiError> {
    let request: SettleRequest = match decode_request(&body) {
        Ok(request) => request,
        Err(RequestError::VersionMismatch) => {
            return Ok(Json(SettleResponse::failed(
                "",
                requirements_network(&body),
                "",
                reason::INVALID_X402_VERSION,
            )));
        }
        Err(RequestError::Malformed(message)) => return Err(ApiError::bad_request(message)),
    };
    let response = facilitator
        .settle(&request.payment_payload, &request.payment_requirements)
        .await?;
    Ok(Json(response))
}

/// `GET /supported` - lists supported payment kinds and signers.
///
/// # Errors
///
/// Returns an [`ApiError`] on internal faults.
pub async fn get_supported(
    State(facilitator): State<FacilitatorState>,
) -> Result<Json<SupportedResponse>, ApiError> {
    Ok(Json(facilitator.supported().await?))
}

/// `GET /health` - liveness probe.
pub async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the facilitator router.
pub fn facilitator_router(state: FacilitatorState) -> Router {
    Router::new()
        .route("/verify", routing::post(post_verify))
        .route("/settle", routing::post(post_settle))
        .route("/supported", routing::get(get_supported))
        .route("/health", routing::get(get_health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402::scheme::SchemeRegistry;

    fn empty_facilitator() -> FacilitatorState {
        Arc::new(FacilitatorLocal::new(SchemeRegistry::new()))
    }

    fn request_body(version: u64) -> serde_json::Value {
        serde_json::json!({
            "paymentPayload": {
                "x402Version": version,
                "scheme": "exact",
                "network": "eip155:84532",
                "payload": {},
            },
            "paymentRequirements": {
                "scheme": "exact",
                "network": "eip155:84532",
                "asset": "0xUSDC",
                "payTo": "0xPayTo",
                "amount": "1000",
                "maxTimeoutSeconds": 60,
            },
        })
    }

    #[tokio::test]
    async fn verify_reports_unsupported_scheme_for_empty_registry() {
        let Json(response) = post_verify(State(empty_facilitator()), Json(request_body(2)))
            .await
            .unwrap();
        assert_eq!(
            response,
            VerifyResponse::invalid("unsupported_scheme", None)
        );
    }

    #[tokio::test]
    async fn verify_gates_the_protocol_version_structurally() {
        let Json(response) = post_verify(State(empty_facilitator()), Json(request_body(1)))
            .await
            .unwrap();
        assert_eq!(
            response,
            VerifyResponse::invalid("invalid_x402_version", None)
        );
    }

    #[tokio::test]
    async fn settle_gates_the_protocol_version_structurally() {
        let Json(response) = post_settle(State(empty_facilitator()), Json(request_body(3)))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.network, "eip155:84532");
        assert_eq!(response.error(), Some("invalid_x402_version"));
    }

    #[tokio::test]
    async fn malformed_bodies_are_a_bad_request() {
        let result = post_verify(
            State(empty_facilitator()),
            Json(serde_json::json!({"nonsense": true})),
        )
        .await;
        assert!(result.is_err());
    }
}
