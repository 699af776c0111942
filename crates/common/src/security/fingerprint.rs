//! Non-reversible identifiers for secrets and records.

use sha2::{Digest, Sha256};

/// Length of a secret fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 16;

/// SHA-256 of the secret, hex encoded and truncated to
/// [`FINGERPRINT_LEN`] characters.
///
/// Used in rotation history so two versions can be told apart without
/// persisting either value.
pub fn secret_fingerprint(secret: &[u8]) -> String {
    let digest = Sha256::digest(secret);
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

/// Full SHA-256 digest of `content` as `0x`-prefixed hex.
pub fn content_digest(content: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(content)))
}
