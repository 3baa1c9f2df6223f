//! Identity proof exchanged over the freshly secured channel.
//!
//! # Wire Format
//!
//! ```text
//! [1 byte: 0x20] [32 bytes: Ed25519 public key]
//! [1 byte: 0x40] [64 bytes: signature over the challenge]
//! ```
//!
//! 98 bytes in total, carried as the first payload of the channel.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::challenge::Challenge;
use crate::error::ChannelError;
use crate::identity::{IdentityKeypair, PublicIdentity, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::provider::CryptoProvider;

/// Encoded size of [`AuthSigMessage`].
pub const AUTH_SIG_MESSAGE_SIZE: usize = (1 + PUBLIC_KEY_SIZE) + (1 + SIGNATURE_SIZE);

/// Identity public key plus its signature over the session challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSigMessage {
    identity_public_key: [u8; PUBLIC_KEY_SIZE],
    signature: [u8; SIGNATURE_SIZE],
}

impl AuthSigMessage {
    pub fn new(identity_public_key: [u8; PUBLIC_KEY_SIZE], signature: [u8; SIGNATURE_SIZE]) -> Self {
        Self {
            identity_public_key,
            signature,
        }
    }

    /// Sign the challenge with our long-term identity.
    pub fn sign(
        identity: &IdentityKeypair,
        provider: &dyn CryptoProvider,
        challenge: &Challenge,
    ) -> Self {
        Self::new(identity.public_key_bytes(), identity.sign(provider, challenge))
    }

    pub fn identity_public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.identity_public_key
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    pub fn encode(&self) -> [u8; AUTH_SIG_MESSAGE_SIZE] {
        let mut out = [0u8; AUTH_SIG_MESSAGE_SIZE];
        let mut buf = &mut out[..];
        buf.put_u8(PUBLIC_KEY_SIZE as u8);
        buf.put_slice(&self.identity_public_key);
        buf.put_u8(SIGNATURE_SIZE as u8);
        buf.put_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        if bytes.len() != AUTH_SIG_MESSAGE_SIZE {
            return Err(ChannelError::MalformedAuthMessage(format!(
                "expected {} bytes, got {}",
                AUTH_SIG_MESSAGE_SIZE,
                bytes.len()
            )));
        }

        let mut buf = bytes;

        let key_len = buf.get_u8() as usize;
        if key_len != PUBLIC_KEY_SIZE {
            return Err(ChannelError::MalformedAuthMessage(format!(
                "public key length {} (expected {})",
                key_len, PUBLIC_KEY_SIZE
            )));
        }
        let mut identity_public_key = [0u8; PUBLIC_KEY_SIZE];
        buf.copy_to_slice(&mut identity_public_key);

        let sig_len = buf.get_u8() as usize;
        if sig_len != SIGNATURE_SIZE {
            return Err(ChannelError::MalformedAuthMessage(format!(
                "signature length {} (expected {})",
                sig_len, SIGNATURE_SIZE
            )));
        }
        let mut signature = [0u8; SIGNATURE_SIZE];
        buf.copy_to_slice(&mut signature);

        Ok(Self::new(identity_public_key, signature))
    }

    /// Check the signature against the locally computed challenge.
    ///
    /// Returns the peer identity on success.
    pub fn verify(
        &self,
        provider: &dyn CryptoProvider,
        challenge: &Challenge,
    ) -> Result<PublicIdentity, ChannelError> {
        let identity = PublicIdentity::from_bytes(self.identity_public_key);
        if identity.verify(provider, challenge, &self.signature) {
            Ok(identity)
        } else {
            Err(ChannelError::AuthenticationFailed)
        }
    }
}

impl fmt::Debug for AuthSigMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSigMessage")
            .field("identity_public_key", &hex::encode(self.identity_public_key))
            .field("signature", &hex::encode(self.signature))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DefaultProvider;

    fn sample() -> AuthSigMessage {
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        let mut sig = [0u8; SIGNATURE_SIZE];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in sig.iter_mut().enumerate() {
            *b = 0xFF - i as u8;
        }
        AuthSigMessage::new(key, sig)
    }

    #[test]
    fn test_roundtrip() {
        let msg = sample();
        let encoded = msg.encode();
        assert_eq!(encoded.len(), 98);
        assert_eq!(encoded[0], 32);
        assert_eq!(encoded[33], 64);

        let decoded = AuthSigMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_wrong_declared_lengths() {
        let mut encoded = sample().encode();
        encoded[0] = 31;
        assert!(matches!(
            AuthSigMessage::decode(&encoded),
            Err(ChannelError::MalformedAuthMessage(_))
        ));

        let mut encoded = sample().encode();
        encoded[33] = 65;
        assert!(matches!(
            AuthSigMessage::decode(&encoded),
            Err(ChannelError::MalformedAuthMessage(_))
        ));
    }

    #[test]
    fn test_wrong_buffer_size() {
        let encoded = sample().encode();
        assert!(matches!(
            AuthSigMessage::decode(&encoded[..97]),
            Err(ChannelError::MalformedAuthMessage(_))
        ));
        assert!(matches!(
            AuthSigMessage::decode(&[]),
            Err(ChannelError::MalformedAuthMessage(_))
        ));
    }

    #[test]
    fn test_verify_against_challenge() {
        let provider = DefaultProvider;
        let identity = IdentityKeypair::generate(&provider);
        let challenge = [0x5Au8; 32];

        let msg = AuthSigMessage::sign(&identity, &provider, &challenge);
        let peer = msg.verify(&provider, &challenge).unwrap();
        assert_eq!(peer.node_id(), identity.node_id());

        let other = [0xA5u8; 32];
        assert!(matches!(
            msg.verify(&provider, &other),
            Err(ChannelError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_swapped_identity_fails() {
        let provider = DefaultProvider;
        let honest = IdentityKeypair::generate(&provider);
        let impostor = IdentityKeypair::generate(&provider);
        let challenge = [1u8; 32];

        let forged = AuthSigMessage::new(
            honest.public_key_bytes(),
            impostor.sign(&provider, &challenge),
        );
        assert!(matches!(
            forged.verify(&provider, &challenge),
            Err(ChannelError::AuthenticationFailed)
        ));
    }
}
