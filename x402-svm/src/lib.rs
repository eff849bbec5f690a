//! Solana (SVM) payment mechanisms for the x402 protocol.
//!
//! A Solana payment is an SPL-Token `TransferChecked` from the payer's
//! associated token account to the recipient's, carried as a
//! client-signed base64 `VersionedTransaction`. When the requirements
//! advertise the facilitator as fee payer (`extra.feePayer`), the client
//! leaves that signature slot open; the facilitator binds a fresh
//! recent blockhash, co-signs it at settlement, and submits.
//!
//! - [`exact`] - single-recipient payment of an exact amount
//! - [`split`] - escrow payment followed by per-recipient on-chain
//!   distribution transfers
//!
//! # Module layout
//!
//! - [`chain`] - chain references, ATA derivation, the RPC provider

pub mod chain;
pub mod exact;
pub mod split;
