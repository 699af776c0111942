//! Secret containers and helpers.
//!
//! Everything here redacts itself in `Debug`/`Display` and zeroes its memory
//! on drop, so a secret that ends up in a log field prints as `***`.

pub mod fingerprint;
pub mod secure_string;

pub use fingerprint::{content_digest, secret_fingerprint, FINGERPRINT_LEN};
pub use secure_string::SecureString;

/// Constant-time comparison to prevent timing attacks
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
