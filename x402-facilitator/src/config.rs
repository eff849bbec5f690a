//! Environment-based configuration.
//!
//! All settings resolve at startup from the process environment
//! (`dotenvy` loads a `.env` first):
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `EVM_RPC_URL_<chainId>` | JSON-RPC endpoint per EVM chain (e.g. `EVM_RPC_URL_84532`) |
//! | `FACILITATOR_EVM_PRIVATE_KEY` | Hex private key funding EVM settlements |
//! | `STELLAR_RPC_URL` | Soroban RPC endpoint (defaults to the public testnet node on testnet) |
//! | `STELLAR_NETWORK` | `testnet` or `pubnet` (default `testnet`) |
//! | `FACILITATOR_STELLAR_PRIVATE_KEY` | `S…` secret seed |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint |
//! | `SOLANA_NETWORK` | CAIP-2 reference or `mainnet`/`devnet` (default `devnet`) |
//! | `FACILITATOR_SOLANA_PRIVATE_KEY` | Base58 keypair |

use std::collections::HashMap;

/// One configured EVM chain.
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    /// Numeric EIP-155 chain id.
    pub chain_id: u64,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
}

/// Parsed service configuration.
#[derive(Debug, Clone, Default)]
pub struct FacilitatorConfig {
    /// EVM chains, keyed by chain id.
    pub evm_chains: Vec<EvmChainConfig>,
    /// Hex private key for EVM settlements.
    pub evm_private_key: Option<String>,
    /// Soroban RPC endpoint.
    pub stellar_rpc_url: Option<String>,
    /// `testnet` or `pubnet`.
    pub stellar_network: String,
    /// `S…` secret seed for Stellar settlements.
    pub stellar_private_key: Option<String>,
    /// Solana JSON-RPC endpoint.
    pub solana_rpc_url: Option<String>,
    /// Solana network reference or alias.
    pub solana_network: String,
    /// Base58 keypair for Solana settlements.
    pub solana_private_key: Option<String>,
}

impl FacilitatorConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&env)
    }

    /// Parses configuration from an explicit variable map.
    #[must_use]
    pub fn from_vars(env: &HashMap<String, String>) -> Self {
        let mut evm_chains: Vec<EvmChainConfig> = env
            .iter()
            .filter_map(|(key, value)| {
                let chain_id = key.strip_prefix("EVM_RPC_URL_")?.parse::<u64>().ok()?;
                Some(EvmChainConfig {
                    chain_id,
                    rpc_url: value.clone(),
                })
            })
            .collect();
        evm_chains.sort_by_key(|chain| chain.chain_id);

        Self {
            evm_chains,
            evm_private_key: env.get("FACILITATOR_EVM_PRIVATE_KEY").cloned(),
            stellar_rpc_url: env.get("STELLAR_RPC_URL").cloned(),
            stellar_network: env
                .get("STELLAR_NETWORK")
                .cloned()
                .unwrap_or_else(|| "testnet".to_owned()),
            stellar_private_key: env.get("FACILITATOR_STELLAR_PRIVATE_KEY").cloned(),
            solana_rpc_url: env.get("SOLANA_RPC_URL").cloned(),
            solana_network: env
                .get("SOLANA_NETWORK")
                .cloned()
                .unwrap_or_else(|| "devnet".to_owned()),
            solana_private_key: env.get("FACILITATOR_SOLANA_PRIVATE_KEY").cloned(),
        }
    }
}
