//! Payment mechanism system.
//!
//! A *mechanism* is a `(scheme, network)` plugin. Each mechanism ships up
//! to three halves, one per protocol role:
//!
//! - [`SchemeClient`] builds signed payloads from requirements
//! - [`SchemeServer`] parses prices and enriches requirements
//! - [`SchemeFacilitator`] verifies and settles payloads
//!
//! Halves are registered in a [`SchemeRegistry`] under a scheme name and
//! a [`ChainIdPattern`](crate::chain::ChainIdPattern) (exact chain or
//! namespace wildcard) and resolved per request.

mod client;
mod facilitator;
mod registry;
mod server;

pub use client::*;
pub use facilitator::*;
pub use registry::*;
pub use server::*;

/// Scheme name for single-recipient payments.
pub const EXACT_SCHEME: &str = "exact";

/// Scheme name for basis-point multi-recipient payments.
pub const SPLIT_SCHEME: &str = "split";
