//! Ephemeral key agreement.
//!
//! A fresh Curve25519 keypair is generated for every connection. The private
//! half is consumed by [`EphemeralKeyPair::agree`] and zeroized as soon as
//! the shared secret exists.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::ChannelError;
use crate::provider::CryptoProvider;

pub const EPHEMERAL_KEY_SIZE: usize = 32;

/// Per-connection agreement keypair.
pub struct EphemeralKeyPair {
    secret: Zeroizing<[u8; 32]>,
    public: [u8; EPHEMERAL_KEY_SIZE],
}

impl EphemeralKeyPair {
    pub fn generate(provider: &dyn CryptoProvider) -> Self {
        let (secret, public) = provider.generate_agreement_keypair();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &[u8; EPHEMERAL_KEY_SIZE] {
        &self.public
    }

    /// Derive the shared secret with the peer's ephemeral public key.
    ///
    /// Consumes the keypair so the private key cannot be reused.
    pub fn agree(
        self,
        provider: &dyn CryptoProvider,
        peer_public_key: &[u8],
    ) -> Result<SharedSecret, ChannelError> {
        let shared = provider
            .ecdh(peer_public_key, &self.secret)
            .map_err(|e| ChannelError::KeyExchangeFailed(e.to_string()))?;
        Ok(SharedSecret(*shared))
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("secret", &"<redacted>")
            .field("public", &hex::encode(self.public))
            .finish()
    }
}

/// 32-byte symmetric key for every frame of one connection, both directions.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
