//! Cryptographic capability provider.
//!
//! The protocol code never calls a primitive directly. Everything goes through
//! [`CryptoProvider`], which is injected into key agreement, the channel and
//! the handshake. This keeps the primitives swappable and allows seeded
//! doubles in tests.
//!
//! [`DefaultProvider`] binds the primitives the wire format was defined with:
//!
//! | Capability | Primitive |
//! |------------|-----------|
//! | identity   | Ed25519 (`ed25519-dalek`) |
//! | agreement  | X25519 followed by HSalsa20 (NaCl `box` precompute) |
//! | frames     | XSalsa20-Poly1305 (NaCl `secretbox`, tag first) |
//! | hash20     | RIPEMD-160 |
//! | hash32     | SHA-256 |

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use salsa20::cipher::consts::U10;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Errors reported by provider primitives.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid agreement public key: {0}")]
    InvalidPublicKey(String),

    #[error("seal failed")]
    Seal,

    #[error("open failed")]
    Open,
}

/// Primitive operations the protocol depends on.
///
/// Private keys cross this boundary as raw bytes wrapped in [`Zeroizing`].
pub trait CryptoProvider: Send + Sync {
    /// Generate an Ed25519 identity keypair `(private, public)`.
    fn generate_signing_keypair(&self) -> (Zeroizing<[u8; 32]>, [u8; 32]);

    /// Derive the Ed25519 public key for a private key.
    fn signing_public_key(&self, private_key: &[u8; 32]) -> [u8; 32];

    fn sign(&self, private_key: &[u8; 32], message: &[u8]) -> [u8; 64];

    fn verify(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool;

    /// Generate a Curve25519 agreement keypair `(private, public)`.
    fn generate_agreement_keypair(&self) -> (Zeroizing<[u8; 32]>, [u8; 32]);

    /// Derive the Curve25519 public key for a private key.
    fn agreement_public_key(&self, private_key: &[u8; 32]) -> [u8; 32];

    /// Compute the 32-byte shared key from the peer's public key and our private key.
    fn ecdh(
        &self,
        peer_public_key: &[u8],
        local_private_key: &[u8; 32],
    ) -> Result<Zeroizing<[u8; 32]>, ProviderError>;

    /// Seal `plaintext`, returning ciphertext with the 16-byte tag.
    fn aead_seal(
        &self,
        plaintext: &[u8],
        nonce: &[u8; 24],
        key: &[u8; 32],
    ) -> Result<Vec<u8>, ProviderError>;

    /// Open a sealed buffer. Fails on any integrity mismatch.
    fn aead_open(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; 24],
        key: &[u8; 32],
    ) -> Result<Vec<u8>, ProviderError>;

    fn hash20(&self, data: &[u8]) -> [u8; 20];

    fn hash32(&self, data: &[u8]) -> [u8; 32];
}

/// Provider backed by the RustCrypto and dalek crates, using the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProvider;

impl CryptoProvider for DefaultProvider {
    fn generate_signing_keypair(&self) -> (Zeroizing<[u8; 32]>, [u8; 32]) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = *signing_key.verifying_key().as_bytes();
        (Zeroizing::new(signing_key.to_bytes()), public)
    }

    fn signing_public_key(&self, private_key: &[u8; 32]) -> [u8; 32] {
        *SigningKey::from_bytes(private_key).verifying_key().as_bytes()
    }

    fn sign(&self, private_key: &[u8; 32], message: &[u8]) -> [u8; 64] {
        SigningKey::from_bytes(private_key).sign(message).to_bytes()
    }

    fn verify(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
        let verifying_key = match VerifyingKey::from_bytes(public_key) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let sig = Signature::from_bytes(signature);
        verifying_key.verify(message, &sig).is_ok()
    }

    fn generate_agreement_keypair(&self) -> (Zeroizing<[u8; 32]>, [u8; 32]) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        (Zeroizing::new(secret.to_bytes()), *public.as_bytes())
    }

    fn agreement_public_key(&self, private_key: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(*private_key);
        *PublicKey::from(&secret).as_bytes()
    }

    fn ecdh(
        &self,
        peer_public_key: &[u8],
        local_private_key: &[u8; 32],
    ) -> Result<Zeroizing<[u8; 32]>, ProviderError> {
        let peer: [u8; 32] = peer_public_key.try_into().map_err(|_| {
            ProviderError::InvalidPublicKey(format!(
                "expected 32 bytes, got {}",
                peer_public_key.len()
            ))
        })?;

        let secret = StaticSecret::from(*local_private_key);
        let shared = secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(ProviderError::InvalidPublicKey(
                "low-order point".to_string(),
            ));
        }

        // NaCl box precompute: HSalsa20 over the raw X25519 output with a zero input block.
        let key = salsa20::hsalsa::<U10>(shared.as_bytes().into(), &Default::default());
        Ok(Zeroizing::new(key.into()))
    }

    fn aead_seal(
        &self,
        plaintext: &[u8],
        nonce: &[u8; 24],
        key: &[u8; 32],
    ) -> Result<Vec<u8>, ProviderError> {
        XSalsa20Poly1305::new(key.into())
            .encrypt(nonce.into(), plaintext)
            .map_err(|_| ProviderError::Seal)
    }

    fn aead_open(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; 24],
        key: &[u8; 32],
    ) -> Result<Vec<u8>, ProviderError> {
        XSalsa20Poly1305::new(key.into())
            .decrypt(nonce.into(), ciphertext)
            .map_err(|_| ProviderError::Open)
    }

    fn hash20(&self, data: &[u8]) -> [u8; 20] {
        Ripemd160::digest(data).into()
    }

    fn hash32(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }
}
