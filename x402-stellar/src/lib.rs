//! Stellar (Soroban) payment mechanisms for the x402 protocol.
//!
//! A Stellar payment is a Soroban `transfer(from, to, amount)` invocation
//! on the asset contract. The client builds and simulates the
//! transaction, signs its authorization entry, and ships the whole
//! envelope as base64 XDR; the facilitator re-validates it, rebuilds it
//! with itself as the (fee-paying) transaction source, and submits it.
//!
//! - [`exact`] - single-recipient payment of an exact amount
//! - [`split`] - escrow payment distributed by basis points (recorded as
//!   internal ledger credits)
//!
//! # Module layout
//!
//! - [`chain`] - networks, passphrases, constants, address validation
//! - [`rpc`] - minimal Soroban JSON-RPC client
//! - [`address`] - `ScAddress` / strkey conversions and `ScVal` helpers
//! - [`auth`] - authorization-entry analysis and signing
//! - [`signer`] - ed25519 keypair wrapper
//! - [`tx`] - envelope assembly, decoding, and signing helpers

pub mod address;
pub mod auth;
pub mod chain;
pub mod exact;
pub mod rpc;
pub mod signer;
pub mod split;
pub mod tx;
