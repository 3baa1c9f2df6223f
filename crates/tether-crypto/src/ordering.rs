//! Canonical ordering of two public keys.
//!
//! Both peers must agree on which ephemeral key is "low" and which is "high"
//! without exchanging anything beyond the keys themselves. The order is
//! decided by the first byte position at which the keys differ, compared as
//! unsigned integers.

/// Order two keys into `(low, high)`.
///
/// The returned slices are the arguments themselves, so callers can tell
/// which side they are on with [`std::ptr::eq`].
///
/// If no byte differs (identical keys), the arguments come back in call
/// order. Correctly generated ephemeral keys never reach this path.
pub fn order<'a>(a: &'a [u8], b: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return if x < y { (a, b) } else { (b, a) };
        }
    }
    (a, b)
}

/// Returns true if `key` is the low key of the pair.
pub fn is_low(key: &[u8], other: &[u8]) -> bool {
    let (low, _) = order(key, other);
    std::ptr::eq(low, key)
}
