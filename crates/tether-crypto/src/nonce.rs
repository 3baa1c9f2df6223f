//! Per-direction frame nonces.
//!
//! Initial nonces are derived from the ephemeral keys alone:
//!
//! ```text
//! nonce1 = RIPEMD160(low || high) || 00 00 00 00
//! nonce2 = nonce1 with its last byte ^ 0x01
//! ```
//!
//! The low peer receives with `nonce1` and sends with `nonce2`; the high
//! peer does the opposite. Each frame advances the nonce of its direction by
//! two, so the two directions step over interleaved values and never meet.

use std::fmt;

use crate::ordering;
use crate::provider::CryptoProvider;

/// Nonce length for the frame cipher.
pub const NONCE_SIZE: usize = 24;

/// 24-byte counter, incremented from the last byte with carry to the left.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Add one. All `0xFF` wraps around to all zero.
    pub fn increment(&mut self) {
        for byte in self.0.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                return;
            }
        }
    }

    /// Step past one frame (two increments).
    pub fn advance(&mut self) {
        self.increment();
        self.increment();
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Initial receive/send nonces for the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoncePair {
    pub receive: Nonce,
    pub send: Nonce,
}

/// Derive the local nonce pair from both ephemeral public keys.
pub fn derive_nonces(
    provider: &dyn CryptoProvider,
    local_ephemeral: &[u8],
    remote_ephemeral: &[u8],
) -> NoncePair {
    let (low, high) = ordering::order(local_ephemeral, remote_ephemeral);

    let digest = provider.hash20(&[low, high].concat());
    let mut nonce1 = [0u8; NONCE_SIZE];
    nonce1[..digest.len()].copy_from_slice(&digest);

    let mut nonce2 = nonce1;
    nonce2[NONCE_SIZE - 1] ^= 1;

    let (receive, send) = if std::ptr::eq(low, local_ephemeral) {
        (nonce1, nonce2)
    } else {
        (nonce2, nonce1)
    };

    NoncePair {
        receive: Nonce(receive),
        send: Nonce(send),
    }
}
