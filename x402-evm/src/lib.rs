//! EIP-155 (EVM) payment mechanisms for the x402 protocol.
//!
//! Payments are EIP-3009 `transferWithAuthorization` messages: the client
//! signs an EIP-712 authorization off-chain, and the facilitator submits
//! it from its own funded signer so the payer needs no gas. Two schemes
//! are provided:
//!
//! - [`exact`] - single-recipient payment of an exact amount
//! - [`split`] - payment to a facilitator escrow, distributed to N
//!   recipients by basis points after settlement
//!
//! # Module layout
//!
//! - [`chain`] - EIP-155 chain references, token amounts, known networks
//! - [`exact`] - client / server / facilitator halves of the exact scheme
//! - [`split`] - the split scheme, layered on the exact machinery

pub mod chain;
pub mod exact;
pub mod split;
