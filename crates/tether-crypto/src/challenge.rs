//! Authentication challenge.
//!
//! Both peers sign `SHA256(low || high)` over the two ephemeral public keys.
//! The value does not depend on which side computes it, so each peer
//! verifies the other's signature against the same bytes it signed itself.

use crate::ordering;
use crate::provider::CryptoProvider;

pub const CHALLENGE_SIZE: usize = 32;

pub type Challenge = [u8; CHALLENGE_SIZE];

/// Compute the challenge for a pair of ephemeral public keys, in either order.
pub fn challenge(provider: &dyn CryptoProvider, key_a: &[u8], key_b: &[u8]) -> Challenge {
    let (low, high) = ordering::order(key_a, key_b);
    provider.hash32(&[low, high].concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::derive_nonces;
    use crate::provider::DefaultProvider;
    use rand::RngCore;

    const KEY_A: &str = "43e0b2a290a366bcd3b4946a8f06f48055d9ce52ad039e81a9a580b83b61f818";
    const KEY_B: &str = "f5880a313a83a29201c563698eab19b94d82254c19598104057cdf359108b933";

    #[test]
    fn test_vector_challenge() {
        let provider = DefaultProvider;
        let a = hex::decode(KEY_A).unwrap();
        let b = hex::decode(KEY_B).unwrap();

        let ab = challenge(&provider, &a, &b);
        let ba = challenge(&provider, &b, &a);
        assert_eq!(ab, ba);
        assert_eq!(
            hex::encode(ab),
            "1c9614243ecd1004cfcc2fb56b79fe681c5d9928ef7a79309e24bfff4c5b5265"
        );
    }

    #[test]
    fn test_challenge_is_order_invariant() {
        let provider = DefaultProvider;
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let mut a = [0u8; 32];
            let mut b = [0u8; 32];
            rng.fill_bytes(&mut a);
            rng.fill_bytes(&mut b);
            assert_eq!(challenge(&provider, &a, &b), challenge(&provider, &b, &a));
        }
    }

    #[test]
    fn test_challenge_differs_from_nonce_seed() {
        let provider = DefaultProvider;
        let a = hex::decode(KEY_A).unwrap();
        let b = hex::decode(KEY_B).unwrap();

        let value = challenge(&provider, &a, &b);
        let nonces = derive_nonces(&provider, &a, &b);
        assert_ne!(&value[..20], &nonces.receive.as_bytes()[..20]);
    }
}
