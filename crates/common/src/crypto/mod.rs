//! Shared cryptographic primitives used across runtime and platform features.
//!
//! - [`encryption`]: AES-256-GCM with a detached authentication tag
//! - [`kdf`]: PBKDF2-HMAC-SHA512 derivation

pub mod encryption;
pub mod kdf;

pub use encryption::{EncryptionService, SealedBox, ALGORITHM, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_key, DerivedKeyPair, MIN_PBKDF2_ITERATIONS};

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill a new buffer of `len` bytes from the operating system CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
