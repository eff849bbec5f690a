//! CAIP-2 chain identifiers and patterns.
//!
//! Every network in the x402 protocol is named by a CAIP-2 identifier of
//! the form `namespace:reference`, e.g. `eip155:8453` (Base),
//! `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp` (Solana mainnet), or
//! `stellar:testnet`. [`ChainIdPattern`] adds wildcard matching so a
//! single mechanism can be registered for a whole namespace.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// A CAIP-2 compliant blockchain identifier.
///
/// # Serialization
///
/// Serializes to/from a colon-separated string: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Creates a new chain ID from namespace and reference components.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Returns the namespace component (e.g. `eip155`, `solana`, `stellar`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component (e.g. `8453`, `testnet`).
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID string.
///
/// A valid chain ID is `namespace:reference` with both components
/// non-empty.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain id format: {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(Self {
            namespace: namespace.into(),
            reference: reference.into(),
        })
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// A pattern for matching chain IDs.
///
/// - **Exact** matches one specific chain (`eip155:8453`)
/// - **Wildcard** matches any chain within a namespace (`eip155:*`)
///
/// Patterns parse from the same string form, with `*` as the reference
/// denoting a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainIdPattern {
    /// Matches exactly one specific chain.
    Exact(ChainId),
    /// Matches any chain within the given namespace.
    Wildcard {
        /// The namespace to match (e.g. `eip155`, `solana`).
        namespace: String,
    },
}

impl ChainIdPattern {
    /// Creates a wildcard pattern for the given namespace.
    pub fn wildcard<S: Into<String>>(namespace: S) -> Self {
        Self::Wildcard {
            namespace: namespace.into(),
        }
    }

    /// Creates an exact pattern for one chain.
    #[must_use]
    pub const fn exact(chain_id: ChainId) -> Self {
        Self::Exact(chain_id)
    }

    /// Returns the namespace this pattern applies to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Exact(chain_id) => chain_id.namespace(),
            Self::Wildcard { namespace } => namespace,
        }
    }

    /// Returns `true` if the given chain ID matches this pattern.
    #[must_use]
    pub fn matches(&self, chain_id: &ChainId) -> bool {
        match self {
            Self::Exact(exact) => exact == chain_id,
            Self::Wildcard { namespace } => chain_id.namespace() == namespace,
        }
    }
}

impl fmt::Display for ChainIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(chain_id) => chain_id.fmt(f),
            Self::Wildcard { namespace } => write!(f, "{namespace}:*"),
        }
    }
}

impl FromStr for ChainIdPattern {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain_id = ChainId::from_str(s)?;
        if chain_id.reference() == "*" {
            Ok(Self::Wildcard {
                namespace: chain_id.namespace,
            })
        } else {
            Ok(Self::Exact(chain_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_parses_and_displays() {
        let id: ChainId = "eip155:84532".parse().unwrap();
        assert_eq!(id.namespace(), "eip155");
        assert_eq!(id.reference(), "84532");
        assert_eq!(id.to_string(), "eip155:84532");
    }

    #[test]
    fn chain_id_rejects_bad_format() {
        assert!("eip155".parse::<ChainId>().is_err());
        assert!(":84532".parse::<ChainId>().is_err());
        assert!("eip155:".parse::<ChainId>().is_err());
    }

    #[test]
    fn chain_id_keeps_reference_colons() {
        // Only the first colon separates namespace from reference.
        let id: ChainId = "stellar:testnet".parse().unwrap();
        assert_eq!(id.reference(), "testnet");
    }

    #[test]
    fn chain_id_json_round_trip() {
        let id = ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1\"");
        let back: ChainId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn pattern_matching() {
        let base = ChainId::new("eip155", "8453");
        let exact = ChainIdPattern::exact(base.clone());
        let wildcard = ChainIdPattern::wildcard("eip155");
        assert!(exact.matches(&base));
        assert!(wildcard.matches(&base));
        assert!(!exact.matches(&ChainId::new("eip155", "1")));
        assert!(!wildcard.matches(&ChainId::new("solana", "8453")));
    }

    #[test]
    fn pattern_parses_wildcard() {
        let pattern: ChainIdPattern = "eip155:*".parse().unwrap();
        assert_eq!(pattern, ChainIdPattern::wildcard("eip155"));
        assert_eq!(pattern.to_string(), "eip155:*");
    }
}
