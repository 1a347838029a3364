//! Constant-time comparison for bypass credentials and bearer tokens.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compare two byte strings without leaking their length or content through
/// timing. Both inputs are reduced to fixed-length SHA-256 digests first, and
/// the digests are compared with `subtle::ConstantTimeEq`.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_equal_inputs() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn rejects_unequal_inputs() {
        assert!(!constant_time_eq(b"secret", b"Secret"));
        assert!(!constant_time_eq(b"short", b"a much longer credential"));
        assert!(!constant_time_eq(b"", b"nonempty"));
    }
}
