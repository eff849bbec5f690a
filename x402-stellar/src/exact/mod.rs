//! The Stellar `exact` scheme: a Soroban `transfer` of an exact amount
//! to a single recipient, fee-sponsored by the facilitator.

pub mod client;
pub mod facilitator;
pub mod server;
pub mod types;

pub use client::StellarClient;
pub use facilitator::{StellarCore, StellarExactFacilitator};
pub use server::StellarServer;
pub use types::ExactStellarPayload;
