//! Ed25519 keypair wrapper for Stellar signing.

use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};

/// Errors constructing a [`StellarKeypair`].
#[derive(Debug, thiserror::Error)]
pub enum KeypairError {
    /// The secret seed is not a valid `S…` strkey.
    #[error("invalid stellar secret seed")]
    InvalidSeed,
}

/// A Stellar ed25519 keypair.
///
/// Wraps the raw signing key together with its strkey encodings so the
/// mechanisms never re-derive them per request.
#[derive(Clone)]
pub struct StellarKeypair {
    signing: SigningKey,
    public_key: String,
}

impl std::fmt::Debug for StellarKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StellarKeypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl StellarKeypair {
    /// Creates a keypair from a `S…` strkey secret seed.
    ///
    /// # Errors
    ///
    /// Returns [`KeypairError::InvalidSeed`] for malformed input.
    pub fn from_secret_seed(seed: &str) -> Result<Self, KeypairError> {
        let secret = stellar_strkey::ed25519::PrivateKey::from_string(seed)
            .map_err(|_| KeypairError::InvalidSeed)?;
        Ok(Self::from_secret_bytes(secret.0))
    }

    /// Creates a keypair from 32 raw secret bytes.
    #[must_use]
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&secret);
        let public = stellar_strkey::ed25519::PublicKey(signing.verifying_key().to_bytes());
        Self {
            public_key: public.to_string(),
            signing,
        }
    }

    /// The `G…` strkey public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The raw 32-byte public key.
    #[must_use]
    pub fn raw_public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// The 4-byte signature hint (tail of the public key).
    #[must_use]
    pub fn hint(&self) -> [u8; 4] {
        let raw = self.raw_public_key();
        [raw[28], raw[29], raw[30], raw[31]]
    }

    /// Signs arbitrary bytes, returning the 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    /// Signs the SHA-256 of `payload` (the standard Stellar signature
    /// base flow).
    #[must_use]
    pub fn sign_payload_hash(&self, payload: &[u8]) -> [u8; 64] {
        let digest: [u8; 32] = Sha256::digest(payload).into();
        self.sign(&digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_g_address_from_seed_bytes() {
        let keypair = StellarKeypair::from_secret_bytes([7u8; 32]);
        assert!(keypair.public_key().starts_with('G'));
        assert_eq!(keypair.public_key().len(), 56);
        let round = stellar_strkey::ed25519::PublicKey::from_string(keypair.public_key()).unwrap();
        assert_eq!(round.0, keypair.raw_public_key());
    }

    #[test]
    fn hint_is_pubkey_tail() {
        let keypair = StellarKeypair::from_secret_bytes([9u8; 32]);
        let raw = keypair.raw_public_key();
        assert_eq!(keypair.hint().as_slice(), &raw[28..32]);
    }
}
