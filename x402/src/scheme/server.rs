//! Server-side mechanism half.

use crate::amount::{AssetAmount, Price};
use crate::chain::ChainId;
use crate::proto::v2::PaymentRequirements;

/// Errors produced while building payment requirements.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The price could not be parsed or converted to atomic units.
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    /// An address in the resource configuration is malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// No asset was configured and the network has no default.
    #[error("no asset configured for network {0}")]
    NoAsset(ChainId),
    /// The requirement's extra data is invalid (e.g. bad split config).
    #[error("invalid requirements extra: {0}")]
    InvalidExtra(String),
    /// No mechanism is registered for the `(scheme, network)` pair.
    #[error(transparent)]
    Unsupported(#[from] crate::scheme::RegistryError),
}

/// The server half of a mechanism: converts human prices to atomic
/// amounts and fills scheme-specific requirement fields.
pub trait SchemeServer: Send + Sync {
    /// The scheme this half implements.
    fn scheme(&self) -> &'static str;

    /// The CAIP-2 namespace this half serves.
    fn namespace(&self) -> &'static str;

    /// Parses a configured price into an atomic-unit asset amount for
    /// the given network.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidPrice`] when the price cannot be
    /// represented in the asset's decimals, or [`ServerError::NoAsset`]
    /// when a money price is given and no default asset is known.
    fn parse_price(&self, price: &Price, network: &ChainId) -> Result<AssetAmount, ServerError>;

    /// Completes a partially-built requirement: fills defaults (EIP-712
    /// domain, fee sponsorship flags) and validates scheme-specific
    /// extras such as split recipients.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the requirement cannot be completed.
    fn enhance_requirements(
        &self,
        requirements: PaymentRequirements,
    ) -> Result<PaymentRequirements, ServerError>;
}
