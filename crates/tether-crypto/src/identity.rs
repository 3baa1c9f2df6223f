//! Ed25519 identity keys and node ids.
//!
//! A **node id** is the lowercase hex encoding of a peer's Ed25519 public key
//! (32 bytes → 64 characters). It is what operators pin and compare.
//!
//! # Example
//!
//! ```
//! use tether_crypto::{DefaultProvider, IdentityKeypair};
//!
//! let provider = DefaultProvider;
//! let keypair = IdentityKeypair::generate(&provider);
//! println!("Node ID: {}", keypair.node_id());
//!
//! let signature = keypair.sign(&provider, b"challenge bytes");
//! assert!(keypair.public().verify(&provider, b"challenge bytes", &signature));
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use zeroize::{Zeroize, Zeroizing};

use crate::error::IdentityError;
use crate::provider::CryptoProvider;

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// Node id: hex-encoded Ed25519 public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parse a node id, accepting either case.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(s.trim()).map_err(|e| IdentityError::InvalidEncoding(e.to_string()))?;

        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(IdentityError::InvalidLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self(hex::encode(bytes)))
    }

    pub fn to_bytes(&self) -> Result<[u8; PUBLIC_KEY_SIZE], IdentityError> {
        let bytes = hex::decode(&self.0).map_err(|e| IdentityError::InvalidEncoding(e.to_string()))?;
        let actual = bytes.len();
        bytes.try_into().map_err(|_| IdentityError::InvalidLength {
            expected: PUBLIC_KEY_SIZE,
            actual,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Long-term Ed25519 identity keypair.
///
/// The private key is zeroized on drop.
pub struct IdentityKeypair {
    secret: Zeroizing<[u8; 32]>,
    public: [u8; PUBLIC_KEY_SIZE],
}

impl IdentityKeypair {
    pub fn generate(provider: &dyn CryptoProvider) -> Self {
        let (secret, public) = provider.generate_signing_keypair();
        Self { secret, public }
    }

    /// Rebuild a keypair from its 32-byte private key.
    pub fn from_secret_bytes(provider: &dyn CryptoProvider, bytes: &[u8; 32]) -> Self {
        let public = provider.signing_public_key(bytes);
        Self {
            secret: Zeroizing::new(*bytes),
            public,
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::from_bytes(&self.public)
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public
    }

    pub fn public(&self) -> PublicIdentity {
        PublicIdentity::from_bytes(self.public)
    }

    /// Get the private key bytes.
    ///
    /// # Security
    /// Handle with care! These bytes can recreate the identity.
    pub fn private_key_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    pub fn sign(&self, provider: &dyn CryptoProvider, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        provider.sign(&self.secret, message)
    }

    /// Save keypair to files.
    ///
    /// Private key is saved with restricted permissions (0600 on Unix).
    pub fn save(
        &self,
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<(), IdentityError> {
        let private_path = private_path.as_ref();
        fs::write(private_path, &self.secret[..])?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(private_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(private_path, perms)?;
        }

        fs::write(public_path, self.public)?;
        Ok(())
    }

    /// Load keypair from a private key file.
    pub fn load(
        provider: &dyn CryptoProvider,
        private_path: impl AsRef<Path>,
    ) -> Result<Self, IdentityError> {
        let mut bytes = fs::read(private_path)?;
        let key_bytes = read_key(&bytes);
        bytes.zeroize();

        let key_bytes = Zeroizing::new(key_bytes?);
        Ok(Self::from_secret_bytes(provider, &key_bytes))
    }

    /// Load only the public key (for verification and pinning).
    pub fn load_public(public_path: impl AsRef<Path>) -> Result<PublicIdentity, IdentityError> {
        let bytes = fs::read(public_path)?;
        Ok(PublicIdentity::from_bytes(read_key(&bytes)?))
    }
}

impl fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeypair")
            .field("secret", &"<redacted>")
            .field("node_id", &self.node_id())
            .finish()
    }
}

fn read_key(bytes: &[u8]) -> Result<[u8; 32], IdentityError> {
    bytes.try_into().map_err(|_| IdentityError::InvalidLength {
        expected: 32,
        actual: bytes.len(),
    })
}

/// Public identity (verifying key only).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    public_key: [u8; PUBLIC_KEY_SIZE],
}

impl PublicIdentity {
    pub fn from_bytes(public_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self { public_key }
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::from_bytes(&self.public_key)
    }

    pub fn verify(
        &self,
        provider: &dyn CryptoProvider,
        message: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> bool {
        provider.verify(&self.public_key, message, signature)
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicIdentity({})", self.node_id())
    }
}
