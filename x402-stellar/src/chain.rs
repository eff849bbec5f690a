//! Stellar networks and protocol constants.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use x402::chain::ChainId;

/// Classic inclusion fee the client puts on its envelope, in stroops.
pub const DEFAULT_BASE_FEE_STROOPS: u32 = 10_000;

/// Ceiling on the total transaction fee a facilitator will sponsor.
pub const DEFAULT_MAX_FEE_STROOPS: u32 = 50_000;

/// Assumed average ledger close time, used to convert timeout seconds
/// into a ledger bound when sampling is unavailable.
pub const DEFAULT_ESTIMATED_LEDGER_SECONDS: u64 = 5;

/// Authorization validity window when the requirements omit one.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Settlement confirmation poll interval.
pub const POLL_INTERVAL_SECONDS: u64 = 2;

/// How many recent ledgers to sample when estimating close time.
pub const LEDGER_SAMPLE_SIZE: u32 = 10;

/// A Stellar network reachable by this mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StellarNetwork {
    /// The SDF test network (`stellar:testnet`).
    Testnet,
    /// The public network (`stellar:pubnet`).
    Pubnet,
}

impl StellarNetwork {
    /// The network passphrase, hashed into every signature.
    #[must_use]
    pub const fn passphrase(&self) -> &'static str {
        match self {
            Self::Testnet => "Test SDF Network ; September 2015",
            Self::Pubnet => "Public Global Stellar Network ; September 2015",
        }
    }

    /// The 32-byte network id: SHA-256 of the passphrase.
    #[must_use]
    pub fn network_id(&self) -> [u8; 32] {
        Sha256::digest(self.passphrase().as_bytes()).into()
    }

    /// The CAIP-2 identifier.
    #[must_use]
    pub fn as_chain_id(&self) -> ChainId {
        match self {
            Self::Testnet => ChainId::new("stellar", "testnet"),
            Self::Pubnet => ChainId::new("stellar", "pubnet"),
        }
    }

    /// Default public RPC endpoint, if one exists.
    ///
    /// Pubnet has no default; operators must configure their own.
    #[must_use]
    pub const fn default_rpc_url(&self) -> Option<&'static str> {
        match self {
            Self::Testnet => Some("https://soroban-testnet.stellar.org"),
            Self::Pubnet => None,
        }
    }
}

/// Error converting a CAIP-2 id into a Stellar network.
#[derive(Debug, thiserror::Error)]
#[error("not a stellar network: {0}")]
pub struct NotStellarError(String);

impl TryFrom<&ChainId> for StellarNetwork {
    type Error = NotStellarError;

    fn try_from(chain_id: &ChainId) -> Result<Self, Self::Error> {
        if chain_id.namespace() != "stellar" {
            return Err(NotStellarError(chain_id.to_string()));
        }
        match chain_id.reference() {
            "testnet" => Ok(Self::Testnet),
            "pubnet" => Ok(Self::Pubnet),
            _ => Err(NotStellarError(chain_id.to_string())),
        }
    }
}

static ASSET_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^C[A-Z2-7]{55}$").expect("static regex"));

static DESTINATION_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^(G[A-Z2-7]{55}|C[A-Z2-7]{55}|M[A-Z2-7]{68})$").expect("static regex"));

/// Returns `true` for a valid asset (contract, `C…`) address.
#[must_use]
pub fn is_valid_asset_address(address: &str) -> bool {
    ASSET_ADDRESS.is_match(address)
}

/// Returns `true` for a valid destination (`G…`, `C…`, or muxed `M…`)
/// address.
#[must_use]
pub fn is_valid_destination_address(address: &str) -> bool {
    DESTINATION_ADDRESS.is_match(address)
}

/// Converts a timeout in seconds into the highest acceptable ledger.
#[must_use]
pub fn max_ledger_for_timeout(
    current_ledger: u32,
    timeout_seconds: u64,
    estimated_ledger_seconds: u64,
) -> u32 {
    let ledgers = timeout_seconds.div_ceil(estimated_ledger_seconds.max(1));
    current_ledger.saturating_add(u32::try_from(ledgers).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_from_chain_id() {
        let testnet = ChainId::new("stellar", "testnet");
        assert_eq!(
            StellarNetwork::try_from(&testnet).unwrap(),
            StellarNetwork::Testnet
        );
        assert!(StellarNetwork::try_from(&ChainId::new("stellar", "futurenet")).is_err());
        assert!(StellarNetwork::try_from(&ChainId::new("eip155", "1")).is_err());
    }

    #[test]
    fn address_validation() {
        let contract = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";
        let account = "GDQOE23CFSUMSVQK4Y5JHPPYK73VYCNHZHA7ENKCV37P6SUEO6XQBKPP";
        assert!(is_valid_asset_address(contract));
        assert!(!is_valid_asset_address(account));
        assert!(is_valid_destination_address(account));
        assert!(is_valid_destination_address(contract));
        assert!(!is_valid_destination_address("0xabc"));
    }

    #[test]
    fn ledger_bound_rounds_up() {
        assert_eq!(max_ledger_for_timeout(100, 10, 5), 102);
        assert_eq!(max_ledger_for_timeout(100, 11, 5), 103);
        assert_eq!(max_ledger_for_timeout(100, 0, 5), 100);
    }

    #[test]
    fn network_ids_differ() {
        assert_ne!(
            StellarNetwork::Testnet.network_id(),
            StellarNetwork::Pubnet.network_id()
        );
    }
}
