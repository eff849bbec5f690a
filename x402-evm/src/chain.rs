//! EVM chain primitives.
//!
//! Chain references, decimal-string token amounts, and the registry of
//! known token deployments used to fill EIP-712 domain data.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256, address};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use x402::chain::ChainId;

/// An EIP-155 numeric chain reference (e.g. 8453 for Base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    /// Wraps a numeric chain id.
    #[must_use]
    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    /// Returns the numeric chain id.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Returns the CAIP-2 form, e.g. `eip155:8453`.
    #[must_use]
    pub fn as_chain_id(&self) -> ChainId {
        ChainId::new("eip155", self.0.to_string())
    }
}

/// Error converting a CAIP-2 id into an EIP-155 reference.
#[derive(Debug, thiserror::Error)]
#[error("not an eip155 chain id: {0}")]
pub struct NotEip155Error(String);

impl TryFrom<&ChainId> for Eip155ChainReference {
    type Error = NotEip155Error;

    fn try_from(chain_id: &ChainId) -> Result<Self, Self::Error> {
        if chain_id.namespace() != "eip155" {
            return Err(NotEip155Error(chain_id.to_string()));
        }
        chain_id
            .reference()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| NotEip155Error(chain_id.to_string()))
    }
}

impl fmt::Display for Eip155ChainReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}", self.0)
    }
}

/// A `U256` token amount serialized as a decimal string.
///
/// All amounts cross the wire as decimal strings so no JSON consumer is
/// tempted into floating point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TokenAmount(pub U256);

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let value = U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)?;
        Ok(Self(value))
    }
}

impl FromStr for TokenAmount {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10).map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

/// EIP-712 domain data and decimals for a known token deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Token contract address.
    pub address: Address,
    /// Number of decimals (6 for USDC).
    pub decimals: u32,
    /// EIP-712 domain name.
    pub name: String,
    /// EIP-712 domain version.
    pub version: String,
}

/// Known token deployments for one EVM network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// The chain this config describes.
    pub chain: Eip155ChainReference,
    /// Known assets; the first entry is the default settlement asset for
    /// money-denominated prices.
    pub assets: Vec<AssetInfo>,
}

impl NetworkConfig {
    /// Finds a known asset by contract address.
    #[must_use]
    pub fn find_asset(&self, address: Address) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.address == address)
    }

    /// The default settlement asset, if any.
    #[must_use]
    pub fn default_asset(&self) -> Option<&AssetInfo> {
        self.assets.first()
    }
}

/// Built-in network configs: USDC deployments on Base and Base Sepolia.
///
/// Operators on other chains register their own [`NetworkConfig`]s.
#[must_use]
pub fn known_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig {
            chain: Eip155ChainReference::new(8453),
            assets: vec![AssetInfo {
                address: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                decimals: 6,
                name: "USD Coin".into(),
                version: "2".into(),
            }],
        },
        NetworkConfig {
            chain: Eip155ChainReference::new(84_532),
            assets: vec![AssetInfo {
                address: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
                decimals: 6,
                name: "USDC".into(),
                version: "2".into(),
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_reference_from_caip2() {
        let chain_id = ChainId::new("eip155", "84532");
        let reference = Eip155ChainReference::try_from(&chain_id).unwrap();
        assert_eq!(reference.inner(), 84_532);
        assert_eq!(reference.as_chain_id(), chain_id);

        assert!(Eip155ChainReference::try_from(&ChainId::new("solana", "1")).is_err());
        assert!(Eip155ChainReference::try_from(&ChainId::new("eip155", "abc")).is_err());
    }

    #[test]
    fn token_amount_decimal_string_round_trip() {
        let amount = TokenAmount(U256::from(1_000u64));
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1000\"");
        let back: TokenAmount = serde_json::from_str("\"1000\"").unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<TokenAmount>("\"0x10\"").is_err());
    }

    #[test]
    fn known_networks_have_usdc_defaults() {
        let networks = known_networks();
        let base_sepolia = networks
            .iter()
            .find(|n| n.chain.inner() == 84_532)
            .unwrap();
        assert_eq!(base_sepolia.default_asset().unwrap().decimals, 6);
    }
}
