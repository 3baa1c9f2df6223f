//! Secret handshake over a blocking duplex stream.
//!
//! # Handshake Flow
//!
//! Both peers run the same sequence; there is no initiator/responder role.
//!
//! ```text
//! 1. generate ephemeral X25519 keypair
//! 2. write own ephemeral public key (32 bytes), flush
//! 3. read peer ephemeral public key (32 bytes)
//! 4. shared secret = ECDH; ephemeral private key dropped
//! 5. nonces + challenge from (low, high) ephemeral keys
//! 6. send AuthSigMessage { identity key, sign(challenge) } as sealed frames
//! 7. receive peer AuthSigMessage, verify against the same challenge
//! ```
//!
//! The handshake has no timeouts of its own. Configure them on the transport.

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::AuthSigMessage;
use crate::challenge::challenge;
use crate::channel::SecureChannel;
use crate::error::ChannelError;
use crate::identity::{IdentityKeypair, NodeId, PublicIdentity};
use crate::kex::{EphemeralKeyPair, EPHEMERAL_KEY_SIZE};
use crate::nonce::derive_nonces;
use crate::provider::CryptoProvider;

/// Handshake options.
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// Reject any peer whose verified identity differs from this key.
    pub expected_peer: Option<[u8; 32]>,
}

impl HandshakeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the peer's identity public key.
    pub fn expect_peer(mut self, public_key: [u8; 32]) -> Self {
        self.expected_peer = Some(public_key);
        self
    }
}

/// Run the handshake and return the secured channel with the verified peer.
///
/// On any error the transport must be dropped; partial state cannot be resumed.
pub fn perform<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    identity: &IdentityKeypair,
    provider: Arc<dyn CryptoProvider>,
    config: &HandshakeConfig,
) -> Result<(SecureChannel<R, W>, PublicIdentity), ChannelError> {
    let ephemeral = EphemeralKeyPair::generate(provider.as_ref());
    let local_ephemeral = *ephemeral.public_key();

    debug!(
        local_ephemeral = %hex::encode(local_ephemeral),
        node_id = %identity.node_id(),
        "sending ephemeral public key"
    );
    writer.write_all(&local_ephemeral)?;
    writer.flush()?;

    let mut remote_ephemeral = [0u8; EPHEMERAL_KEY_SIZE];
    reader.read_exact(&mut remote_ephemeral)?;
    debug!(remote_ephemeral = %hex::encode(remote_ephemeral), "received ephemeral public key");

    let secret = ephemeral.agree(provider.as_ref(), &remote_ephemeral)?;
    let nonces = derive_nonces(provider.as_ref(), &local_ephemeral, &remote_ephemeral);
    let challenge = challenge(provider.as_ref(), &local_ephemeral, &remote_ephemeral);
    debug!(challenge = %hex::encode(challenge), "derived session parameters");

    let local_auth = AuthSigMessage::sign(identity, provider.as_ref(), &challenge);
    let mut channel = SecureChannel::new(reader, writer, secret, nonces, Arc::clone(&provider));

    channel.send(&local_auth.encode())?;
    let remote_auth = channel.receive_auth_message()?;

    let peer = match remote_auth.verify(provider.as_ref(), &challenge) {
        Ok(peer) => peer,
        Err(e) => {
            warn!(
                claimed = %NodeId::from_bytes(remote_auth.identity_public_key()),
                "peer signature does not verify"
            );
            channel.poison();
            return Err(e);
        }
    };

    if let Some(expected) = config.expected_peer {
        if peer.as_bytes() != &expected {
            warn!(peer = %peer.node_id(), expected = %NodeId::from_bytes(&expected), "unexpected peer");
            channel.poison();
            return Err(ChannelError::UnexpectedPeer(peer.node_id().to_string()));
        }
    }

    debug!(peer = %peer.node_id(), "handshake complete");
    Ok((channel, peer))
}
