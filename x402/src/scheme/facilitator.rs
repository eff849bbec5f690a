//! Facilitator-side mechanism half.

use async_trait::async_trait;

use crate::facilitator::FacilitatorError;
use crate::proto::v2::{PaymentPayload, PaymentRequirements};
use crate::proto::{SettleResponse, VerifyResponse};

/// The facilitator half of a mechanism: verification and settlement for
/// one `(scheme, network-pattern)`.
///
/// Verification and settlement *failures* are values
/// ([`VerifyResponse::Invalid`], `SettleResponse { success: false, .. }`);
/// `Err` is reserved for faults that prevented producing an answer at
/// all (RPC transport breakage, misconfiguration).
///
/// Implementations are shared across concurrent requests and must be
/// internally immutable after construction.
#[async_trait]
pub trait SchemeFacilitator: Send + Sync {
    /// Verifies an untrusted payload against the stated requirements.
    ///
    /// Deterministic for a fixed chain state: two calls with the same
    /// inputs produce identical responses.
    ///
    /// # Errors
    ///
    /// Only on transport faults; every payload-level problem is an
    /// `Ok(VerifyResponse::Invalid { .. })`.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError>;

    /// Re-verifies and then settles the payment on-chain.
    ///
    /// Implementations MUST re-run verification and refuse to broadcast
    /// on failure. After `sendTransaction` has been issued the returned
    /// response always carries the transaction hash, even on failure or
    /// timeout, so callers can reconcile.
    ///
    /// # Errors
    ///
    /// Only on transport faults, as for [`SchemeFacilitator::verify`].
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;

    /// Addresses of the signers this mechanism settles with.
    fn signers(&self) -> Vec<String>;

    /// Scheme-specific data advertised through `GET /supported`
    /// (e.g. `feePayer` on Solana, `areFeesSponsored` on Stellar).
    fn extra(&self) -> Option<serde_json::Value> {
        None
    }
}
