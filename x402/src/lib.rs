//! Core types and role logic for the x402 payment protocol.
//!
//! x402 lets a resource server demand payment before serving a response,
//! a client attach a signed authorization transparently, and a third-party
//! facilitator verify and settle that authorization on one of several
//! blockchains. This crate is chain-agnostic: it defines the wire format,
//! the scheme registry, and the three role cores, while chain-specific
//! mechanisms live in sibling crates (`x402-evm`, `x402-stellar`,
//! `x402-svm`).
//!
//! # Protocol
//!
//! A paid request exchanges three messages:
//!
//! 1. The server answers an unpaid request with a
//!    [`proto::v2::PaymentRequired`] envelope listing acceptable
//!    [`proto::v2::PaymentRequirements`].
//! 2. The client picks a requirement it can satisfy, builds a signed
//!    [`proto::v2::PaymentPayload`], and retries.
//! 3. The server has a facilitator verify and settle the payload and
//!    attaches the resulting [`proto::SettleResponse`] to its answer.
//!
//! # Modules
//!
//! - [`amount`] - Human-readable price parsing at the server boundary
//! - [`chain`] - CAIP-2 chain identifiers and patterns
//! - [`client`] - Client role core: requirement selection and payload building
//! - [`facilitator`] - The [`Facilitator`](facilitator::Facilitator) trait and local dispatcher
//! - [`proto`] - Wire format types, version gate, encoding utilities
//! - [`scheme`] - Mechanism halves and the `(scheme, network)` registry
//! - [`server`] - Resource server role core: requirements building and the payment gate
//! - [`split`] - Basis-point split configuration and share allocation

pub mod amount;
pub mod chain;
pub mod client;
pub mod facilitator;
pub mod proto;
pub mod scheme;
pub mod server;
pub mod split;
