//! Solana chain primitives and the RPC provider.

use std::sync::Arc;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_keypair::Keypair;
use solana_pubkey::{Pubkey, pubkey};
use solana_signer::Signer;
use x402::chain::ChainId;

/// The Associated Token Account program.
pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Genesis-hash reference of Solana mainnet-beta.
pub const MAINNET_REFERENCE: &str = "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

/// Genesis-hash reference of Solana devnet.
pub const DEVNET_REFERENCE: &str = "EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// Confirmation budget for settlement submissions.
pub const CONFIRM_TIMEOUT_SECONDS: u64 = 30;

/// SPL token decimals assumed when the requirements don't declare any
/// (USDC uses 6).
pub const DEFAULT_DECIMALS: u8 = 6;

/// A Solana chain reference (the genesis-hash prefix used by CAIP-2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolanaChainReference(String);

impl SolanaChainReference {
    /// Mainnet-beta.
    #[must_use]
    pub fn mainnet() -> Self {
        Self(MAINNET_REFERENCE.to_owned())
    }

    /// Devnet.
    #[must_use]
    pub fn devnet() -> Self {
        Self(DEVNET_REFERENCE.to_owned())
    }

    /// The CAIP-2 identifier, e.g. `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`.
    #[must_use]
    pub fn as_chain_id(&self) -> ChainId {
        ChainId::new("solana", self.0.clone())
    }
}

/// Error converting a CAIP-2 id into a Solana reference.
#[derive(Debug, thiserror::Error)]
#[error("not a solana chain id: {0}")]
pub struct NotSolanaError(String);

impl TryFrom<&ChainId> for SolanaChainReference {
    type Error = NotSolanaError;

    fn try_from(chain_id: &ChainId) -> Result<Self, Self::Error> {
        if chain_id.namespace() != "solana" {
            return Err(NotSolanaError(chain_id.to_string()));
        }
        Ok(Self(chain_id.reference().to_owned()))
    }
}

/// Derives the associated token account for `(owner, mint)` under the
/// given token program.
#[must_use]
pub fn derive_ata(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    )
    .0
}

/// RPC access plus the facilitator keypair for one Solana chain.
///
/// Shared across concurrent requests; the keypair is immutable after
/// construction and `RpcClient` is internally synchronized.
#[derive(Clone)]
pub struct SolanaProvider {
    rpc: Arc<RpcClient>,
    keypair: Arc<Keypair>,
    chain: SolanaChainReference,
}

impl std::fmt::Debug for SolanaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaProvider")
            .field("chain", &self.chain)
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

impl SolanaProvider {
    /// Creates a provider over an RPC endpoint and keypair.
    #[must_use]
    pub fn new(rpc_url: String, keypair: Keypair, chain: SolanaChainReference) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new(rpc_url)),
            keypair: Arc::new(keypair),
            chain,
        }
    }

    /// The RPC client.
    #[must_use]
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// The keypair held by this provider.
    #[must_use]
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The keypair's public key.
    #[must_use]
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// The chain this provider serves.
    #[must_use]
    pub const fn chain(&self) -> &SolanaChainReference {
        &self.chain
    }
}
