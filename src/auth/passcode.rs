//! Passcode hashing and verification.
//!
//! Stored records look like `salt_hex:hash_hex`. Records without a `:` are
//! legacy plaintext passcodes and are still accepted.

use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SEPARATOR: char = ':';

#[derive(Clone, Copy, Debug)]
pub struct PasscodeCodec {
    iterations: u32,
}

impl Default for PasscodeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PasscodeCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Codec with a custom work factor. Records are only verifiable by a codec
    /// using the same iteration count.
    #[must_use]
    pub const fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a passcode with a fresh random salt.
    #[must_use]
    pub fn hash(&self, passcode: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let derived = self.derive(passcode, &salt);
        format!("{}{SEPARATOR}{}", hex::encode(salt), hex::encode(derived))
    }

    /// Check a passcode against a stored record.
    #[must_use]
    pub fn verify(&self, passcode: &str, stored: &str) -> bool {
        let Some((salt_hex, hash_hex)) = stored.split_once(SEPARATOR) else {
            return constant_time_eq(passcode.as_bytes(), stored.as_bytes());
        };

        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        let Ok(expected) = hex::decode(hash_hex) else {
            return false;
        };

        let derived = self.derive(passcode, &salt);
        constant_time_eq(&derived, &expected)
    }

    fn derive(&self, passcode: &str, salt: &[u8]) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(passcode.as_bytes(), salt, self.iterations, &mut out);
        out
    }
}

/// Compare two byte strings without leaking where (or whether by length) they
/// differ: both sides are digested to a fixed width first.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    a.ct_eq(&b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasscodeCodec {
        PasscodeCodec::with_iterations(1_000)
    }

    #[test]
    fn hash_then_verify_accepts_same_passcode() {
        let codec = fast();
        let stored = codec.hash("open sesame");
        assert!(codec.verify("open sesame", &stored));
    }

    #[test]
    fn verify_rejects_other_passcode() {
        let codec = fast();
        let stored = codec.hash("open sesame");
        assert!(!codec.verify("open sesame!", &stored));
        assert!(!codec.verify("", &stored));
    }

    #[test]
    fn hash_is_salted() {
        let codec = fast();
        let first = codec.hash("same");
        let second = codec.hash("same");
        assert_ne!(first, second);
        assert!(codec.verify("same", &first));
        assert!(codec.verify("same", &second));
    }

    #[test]
    fn hash_format_is_salt_and_digest_hex() {
        let stored = fast().hash("x");
        let (salt, hash) = stored.split_once(':').unwrap_or_default();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(hash.len(), HASH_LEN * 2);
        assert!(stored.chars().filter(|c| *c != ':').all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn default_codec_uses_production_work_factor() {
        let codec = PasscodeCodec::default();
        assert_eq!(codec.iterations(), DEFAULT_ITERATIONS);
        let stored = codec.hash("hunter2");
        assert!(codec.verify("hunter2", &stored));
    }

    #[test]
    fn iteration_count_must_match() {
        let stored = PasscodeCodec::with_iterations(1_000).hash("abc");
        assert!(!PasscodeCodec::with_iterations(1_001).verify("abc", &stored));
    }

    #[test]
    fn legacy_plaintext_record() {
        let codec = fast();
        assert!(codec.verify("letmein", "letmein"));
        assert!(!codec.verify("letmein", "letmeout"));
        assert!(!codec.verify("letmein", "letmein-but-longer"));
    }

    #[test]
    fn malformed_hashed_record_is_rejected() {
        let codec = fast();
        assert!(!codec.verify("abc", "zz:00"));
        assert!(!codec.verify("abc", "00:not-hex"));
        assert!(!codec.verify("abc", ":"));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
    }
}
