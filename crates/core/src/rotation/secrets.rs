//! Generation, decoding and fingerprinting of rotated secrets

use auditvault_common::crypto::random_bytes;
use auditvault_common::security::secret_fingerprint;
use auditvault_common::SecureString;
use auditvault_domain::{RotationPolicy, SecretEncoding};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use zeroize::Zeroizing;

/// `policy.key_length` CSPRNG bytes, encoded per `policy.encoding`.
pub fn generate_secret(policy: &RotationPolicy) -> SecureString {
    let raw = Zeroizing::new(random_bytes(policy.key_length));
    SecureString::new(encode(&raw, policy.encoding))
}

pub fn encode(raw: &[u8], encoding: SecretEncoding) -> String {
    match encoding {
        SecretEncoding::Base64 => STANDARD.encode(raw),
        SecretEncoding::Hex => hex::encode(raw),
        SecretEncoding::Urlsafe => URL_SAFE_NO_PAD.encode(raw),
    }
}

/// Decoded bytes, or `None` when `value` is not valid under `encoding`.
pub fn decode(value: &str, encoding: SecretEncoding) -> Option<Zeroizing<Vec<u8>>> {
    let decoded = match encoding {
        SecretEncoding::Base64 => STANDARD.decode(value).ok(),
        SecretEncoding::Hex => hex::decode(value).ok(),
        SecretEncoding::Urlsafe => URL_SAFE_NO_PAD.decode(value.trim_end_matches('=')).ok(),
    };
    decoded.map(Zeroizing::new)
}

/// True when `value` decodes under the policy encoding to at least
/// `key_length` bytes.
pub fn satisfies_policy(value: &SecureString, policy: &RotationPolicy) -> bool {
    decode(value.expose(), policy.encoding).is_some_and(|bytes| bytes.len() >= policy.key_length)
}

/// Truncated SHA-256 of the encoded secret.
pub fn fingerprint(value: &SecureString) -> String {
    secret_fingerprint(value.expose().as_bytes())
}
