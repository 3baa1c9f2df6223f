//! Secret-handshake transport for Tether.
//!
//! This crate provides:
//! - Ed25519 identity keys and node ids
//! - Ephemeral X25519 agreement per connection
//! - Deterministic nonce and challenge derivation from the ephemeral keys
//! - Mutual authentication of identities over the encrypted channel
//! - A framed, sealed, blocking channel for the rest of the session
//!
//! # Design
//!
//! ```text
//! Peer A                                          Peer B
//!   |  -> ephemeral public key (32 bytes, clear)    |
//!   |  <- ephemeral public key (32 bytes, clear)    |
//!   |                                               |
//!   [  shared secret = ECDH(eph_priv, peer_eph_pub)  ]
//!   [  nonces, challenge = f(low_eph || high_eph)    ]
//!   |                                               |
//!   |  -> AuthSigMessage (sealed frames)            |
//!   |  <- AuthSigMessage (sealed frames)            |
//!   |                                               |
//!   [  both verify the peer signed the challenge     ]
//! ```
//!
//! Every frame on the wire is exactly [`frame::SEALED_FRAME_SIZE`] bytes.
//! All primitives are reached through [`CryptoProvider`].

#![forbid(unsafe_code)]

pub mod auth;
pub mod challenge;
pub mod channel;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod identity;
pub mod kex;
pub mod nonce;
pub mod ordering;
pub mod provider;

pub use auth::AuthSigMessage;
pub use channel::{ChannelReceiver, ChannelSender, SecureChannel};
pub use error::{ChannelError, IdentityError};
pub use handshake::{perform as handshake, HandshakeConfig};
pub use identity::{IdentityKeypair, NodeId, PublicIdentity};
pub use kex::{EphemeralKeyPair, SharedSecret};
pub use nonce::{Nonce, NoncePair};
pub use provider::{CryptoProvider, DefaultProvider};
