//! PBKDF2-HMAC-SHA512 key derivation.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CommonError, CommonResult};

/// Lowest iteration count accepted for PBKDF2-HMAC-SHA512.
pub const MIN_PBKDF2_ITERATIONS: u32 = 310_000;

/// Derive `output.len()` bytes from `secret` and `salt`.
///
/// Iteration counts below [`MIN_PBKDF2_ITERATIONS`] are rejected as a
/// configuration error rather than silently raised.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
    output: &mut [u8],
) -> CommonResult<()> {
    if iterations < MIN_PBKDF2_ITERATIONS {
        return Err(CommonError::config_field(
            "pbkdf2_iterations",
            format!("must be at least {MIN_PBKDF2_ITERATIONS}, got {iterations}"),
        ));
    }
    if salt.is_empty() {
        return Err(CommonError::validation("salt", "must not be empty"));
    }

    pbkdf2_hmac::<Sha512>(secret, salt, iterations, output);
    Ok(())
}

/// A 64-byte PBKDF2 output split into an AES-256 key and an HMAC key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyPair {
    encryption_key: [u8; 32],
    mac_key: [u8; 32],
}

impl DerivedKeyPair {
    /// Run PBKDF2-HMAC-SHA512 and split the 64-byte output in half.
    pub fn derive(secret: &[u8], salt: &[u8], iterations: u32) -> CommonResult<Self> {
        let mut output = Zeroizing::new([0u8; 64]);
        derive_key(secret, salt, iterations, &mut output[..])?;

        let mut encryption_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        encryption_key.copy_from_slice(&output[..32]);
        mac_key.copy_from_slice(&output[32..]);

        Ok(Self { encryption_key, mac_key })
    }

    /// First half of the derived output.
    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }

    /// Second half of the derived output.
    pub fn mac_key(&self) -> &[u8; 32] {
        &self.mac_key
    }
}

impl std::fmt::Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeyPair([REDACTED])")
    }
}
