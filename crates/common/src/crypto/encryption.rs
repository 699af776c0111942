//! AES-256-GCM encryption with the authentication tag kept separate from the
//! ciphertext.
//!
//! Callers that persist the three parts in distinct columns (nonce, tag,
//! ciphertext) work with [`SealedBox`] directly. Every call to
//! [`EncryptionService::seal`] draws a fresh 96-bit nonce from the OS CSPRNG;
//! there is no API that accepts a caller-chosen nonce.
//!
//! ## Usage
//!
//! ```rust
//! use auditvault_common::crypto::encryption::EncryptionService;
//!
//! let key = EncryptionService::generate_key();
//! let service = EncryptionService::new(&key)?;
//!
//! let sealed = service.seal(b"sensitive data", b"")?;
//! let opened = service.open(&sealed, b"")?;
//! assert_eq!(opened, b"sensitive data");
//! # Ok::<(), auditvault_common::error::CommonError>(())
//! ```

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::kdf::derive_key;
use crate::error::{CommonError, CommonResult};

/// Algorithm label recorded next to persisted payloads.
pub const ALGORITHM: &str = "AES-256-GCM";
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// GCM tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one AES-256-GCM encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// AES-GCM encryption service bound to one 256-bit key.
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .field("algorithm", &ALGORITHM)
            .finish()
    }
}

impl EncryptionService {
    /// Create a new encryption service from a raw 32-byte key.
    pub fn new(key: &[u8]) -> CommonResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CommonError::crypto(format!(
                "Encryption key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CommonError::crypto(format!("Failed to create encryption cipher: {e}")))?;

        Ok(Self { cipher })
    }

    /// Derive the key from a password with PBKDF2-HMAC-SHA512.
    ///
    /// The caller owns the salt and must persist it next to the ciphertext.
    pub fn from_password(password: &[u8], salt: &[u8], iterations: u32) -> CommonResult<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        derive_key(password, salt, iterations, &mut key[..])?;
        Self::new(&key[..])
    }

    /// Generate a random 32-byte symmetric key.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypt `plaintext` under a freshly generated nonce.
    ///
    /// `aad` is authenticated but not encrypted; pass an empty slice when
    /// there is no associated data.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> CommonResult<SealedBox> {
        let nonce = Self::generate_nonce();
        let mut buffer = plaintext.to_vec();

        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
            .map_err(|e| CommonError::crypto(format!("Encryption failed: {e}")))?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(SealedBox { nonce, tag: tag_bytes, ciphertext: buffer })
    }

    /// Authenticate and decrypt a [`SealedBox`].
    ///
    /// Nothing is returned unless the tag verifies; a tampered nonce, tag or
    /// ciphertext yields `CommonError::Crypto`.
    pub fn open(&self, sealed: &SealedBox, aad: &[u8]) -> CommonResult<Vec<u8>> {
        let mut buffer = sealed.ciphertext.clone();

        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&sealed.nonce),
                aad,
                &mut buffer,
                GenericArray::from_slice(&sealed.tag),
            )
            .map_err(|_| CommonError::crypto("Decryption failed: authentication tag mismatch"))?;

        Ok(buffer)
    }

    fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}
