//! x402 facilitator HTTP service.
//!
//! Exposes the facilitator API over axum:
//!
//! - `POST /verify` - verify a payment payload against requirements
//! - `POST /settle` - verify and settle a payment on-chain
//! - `GET /supported` - advertise supported `(scheme, network)` kinds
//! - `GET /health` - liveness probe
//!
//! Chain mechanisms are compiled in behind the `chain-eip155`,
//! `chain-stellar`, and `chain-solana` features (all on by default), so
//! a deployment that serves only one chain links only that chain's SDK.

pub mod config;
pub mod error;
pub mod handlers;
