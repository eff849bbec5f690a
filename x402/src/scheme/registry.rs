//! The `(scheme, network-pattern)` registry.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

use crate::chain::{ChainId, ChainIdPattern};

/// Key identifying one registered mechanism half.
///
/// The chain reference may be the literal `*`, denoting a namespace
/// wildcard; [`SchemeRegistry::resolve`] prefers exact entries over
/// wildcards.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SchemeKey {
    /// The chain (or `namespace:*` wildcard) this entry serves.
    pub chain_id: ChainId,
    /// The scheme name (e.g. `exact`, `split`).
    pub scheme: String,
}

impl SchemeKey {
    /// Creates a key from a scheme name and pattern.
    pub fn new(scheme: impl Into<String>, pattern: &ChainIdPattern) -> Self {
        let chain_id = match pattern {
            ChainIdPattern::Exact(chain_id) => chain_id.clone(),
            ChainIdPattern::Wildcard { namespace } => ChainId::new(namespace.clone(), "*"),
        };
        Self {
            chain_id,
            scheme: scheme.into(),
        }
    }

    /// Returns the namespace-wildcard form of this key.
    #[must_use]
    pub fn as_wildcard(&self) -> Self {
        Self {
            chain_id: ChainId::new(self.chain_id.namespace(), "*"),
            scheme: self.scheme.clone(),
        }
    }

    /// Returns `true` if this key is a namespace wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.chain_id.reference() == "*"
    }
}

impl Display for SchemeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.scheme)
    }
}

/// Error returned when no mechanism matches a `(scheme, network)` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No mechanism is registered under the scheme name at all.
    #[error("unsupported_scheme: {0}")]
    UnsupportedScheme(String),
    /// The scheme exists, but not for the requested network.
    #[error("unsupported_network: {0}")]
    UnsupportedNetwork(ChainId),
}

impl RegistryError {
    /// The machine-readable reason string for this error.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnsupportedScheme(_) => crate::proto::reason::UNSUPPORTED_SCHEME,
            Self::UnsupportedNetwork(_) => crate::proto::reason::UNSUPPORTED_NETWORK,
        }
    }
}

/// Registry of mechanism halves keyed by `(scheme, network-pattern)`.
///
/// Registration is idempotent (re-registering a key replaces the entry)
/// and at most one wildcard can exist per `(scheme, namespace)` since the
/// wildcard is itself a key. The registry is immutable after startup;
/// concurrent readers need no locks.
pub struct SchemeRegistry<H> {
    entries: HashMap<SchemeKey, H>,
}

impl<H> Debug for SchemeRegistry<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.entries.keys().map(ToString::to_string).collect();
        f.debug_tuple("SchemeRegistry").field(&keys).finish()
    }
}

impl<H> Default for SchemeRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SchemeRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a half under a scheme name and network pattern.
    pub fn register(&mut self, scheme: impl Into<String>, pattern: &ChainIdPattern, half: H) {
        self.entries.insert(SchemeKey::new(scheme, pattern), half);
    }

    /// Builder-style [`SchemeRegistry::register`].
    #[must_use]
    pub fn with(mut self, scheme: impl Into<String>, pattern: &ChainIdPattern, half: H) -> Self {
        self.register(scheme, pattern, half);
        self
    }

    /// Resolves the half serving `(scheme, chain_id)`.
    ///
    /// Exact entries win over namespace wildcards.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnsupportedScheme`] if the scheme name is unknown,
    /// [`RegistryError::UnsupportedNetwork`] if the scheme exists but no
    /// pattern covers the chain.
    pub fn resolve(&self, scheme: &str, chain_id: &ChainId) -> Result<&H, RegistryError> {
        let key = SchemeKey {
            chain_id: chain_id.clone(),
            scheme: scheme.to_owned(),
        };
        if let Some(half) = self.entries.get(&key) {
            return Ok(half);
        }
        if let Some(half) = self.entries.get(&key.as_wildcard()) {
            return Ok(half);
        }
        if self.entries.keys().any(|k| k.scheme == scheme) {
            Err(RegistryError::UnsupportedNetwork(chain_id.clone()))
        } else {
            Err(RegistryError::UnsupportedScheme(scheme.to_owned()))
        }
    }

    /// Iterates over all registered entries.
    pub fn entries(&self) -> impl Iterator<Item = (&SchemeKey, &H)> {
        self.entries.iter()
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_wildcard() {
        let mut registry = SchemeRegistry::new();
        registry.register("exact", &ChainIdPattern::wildcard("eip155"), "wild");
        registry.register(
            "exact",
            &ChainIdPattern::exact(ChainId::new("eip155", "8453")),
            "base",
        );

        let base = ChainId::new("eip155", "8453");
        let other = ChainId::new("eip155", "84532");
        assert_eq!(registry.resolve("exact", &base), Ok(&"base"));
        assert_eq!(registry.resolve("exact", &other), Ok(&"wild"));
    }

    #[test]
    fn unknown_scheme_vs_unknown_network() {
        let mut registry = SchemeRegistry::new();
        registry.register("exact", &ChainIdPattern::wildcard("eip155"), ());

        let solana = ChainId::new("solana", "mainnet");
        assert_eq!(
            registry.resolve("split", &solana),
            Err(RegistryError::UnsupportedScheme("split".into()))
        );
        assert_eq!(
            registry.resolve("exact", &solana),
            Err(RegistryError::UnsupportedNetwork(solana))
        );
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = SchemeRegistry::new();
        let pattern = ChainIdPattern::wildcard("stellar");
        registry.register("exact", &pattern, 1u8);
        registry.register("exact", &pattern, 2u8);
        assert_eq!(registry.len(), 1);
        let testnet = ChainId::new("stellar", "testnet");
        assert_eq!(registry.resolve("exact", &testnet), Ok(&2u8));
    }
}
