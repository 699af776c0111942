//! Key material and the categories of managed secrets.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::impl_domain_status_conversions;

/// Tier of the acquisition chain that produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Hsm,
    Tpm,
    Software,
}

impl_domain_status_conversions!(KeySource {
    Hsm => "hsm",
    Tpm => "tpm",
    Software => "software",
});

impl KeySource {
    /// Every tier in acquisition order.
    pub const CHAIN: [KeySource; 3] = [KeySource::Hsm, KeySource::Tpm, KeySource::Software];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hsm => "hsm",
            Self::Tpm => "tpm",
            Self::Software => "software",
        }
    }

    /// True for every tier other than the HSM.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Hsm)
    }
}

/// The active symmetric key plus its provenance and cache deadline.
///
/// Owned by the key provider's cache slot and handed out behind an `Arc`;
/// the bytes are zeroed when the last reference drops. `Debug` never prints
/// key bytes.
pub struct SecretMaterial {
    encryption_key: [u8; 32],
    mac_key: Option<[u8; 32]>,
    source: KeySource,
    acquired_at: Instant,
    expires_at: Instant,
    acquired_at_utc: DateTime<Utc>,
}

impl SecretMaterial {
    pub fn new(
        encryption_key: [u8; 32],
        source: KeySource,
        acquired_at: Instant,
        ttl: Duration,
        acquired_at_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            encryption_key,
            mac_key: None,
            source,
            acquired_at,
            expires_at: acquired_at + ttl,
            acquired_at_utc,
        }
    }

    /// Attach the HMAC half produced by the software tier.
    pub fn with_mac_key(mut self, mac_key: [u8; 32]) -> Self {
        self.mac_key = Some(mac_key);
        self
    }

    /// AES-256 key bytes. Never log the result.
    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }

    /// HMAC key bytes, present only for software-derived material.
    pub fn mac_key(&self) -> Option<&[u8; 32]> {
        self.mac_key.as_ref()
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn acquired_at_utc(&self) -> DateTime<Utc> {
        self.acquired_at_utc
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

impl Drop for SecretMaterial {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
        if let Some(mac_key) = self.mac_key.as_mut() {
            mac_key.zeroize();
        }
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("key", &"[REDACTED]")
            .field("has_mac_key", &self.mac_key.is_some())
            .field("source", &self.source)
            .field("acquired_at_utc", &self.acquired_at_utc)
            .finish()
    }
}

/// Category of long-lived application secret managed by rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    JwtSecret,
    SessionSecret,
    CsrfSecret,
    EncryptionKey,
}

impl KeyType {
    pub const ALL: [KeyType; 4] =
        [KeyType::JwtSecret, KeyType::SessionSecret, KeyType::CsrfSecret, KeyType::EncryptionKey];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JwtSecret => "jwt_secret",
            Self::SessionSecret => "session_secret",
            Self::CsrfSecret => "csrf_secret",
            Self::EncryptionKey => "encryption_key",
        }
    }

    /// Variable name of the secret's `NAME=value` line in the secret store.
    pub fn env_name(&self) -> &'static str {
        match self {
            Self::JwtSecret => "JWT_SECRET",
            Self::SessionSecret => "SESSION_SECRET",
            Self::CsrfSecret => "CSRF_SECRET",
            Self::EncryptionKey => "ENCRYPTION_KEY",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    /// Accepts the canonical name (`jwt_secret`) or the short alias (`jwt`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jwt_secret" | "jwt" => Ok(Self::JwtSecret),
            "session_secret" | "session" => Ok(Self::SessionSecret),
            "csrf_secret" | "csrf" => Ok(Self::CsrfSecret),
            "encryption_key" | "encryption" => Ok(Self::EncryptionKey),
            _ => Err(format!("Invalid KeyType: {}", s)),
        }
    }
}

/// Text encoding of a stored secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    /// Standard alphabet, padded
    Base64,
    Hex,
    /// URL-safe alphabet, unpadded
    Urlsafe,
}

impl_domain_status_conversions!(SecretEncoding {
    Base64 => "base64",
    Hex => "hex",
    Urlsafe => "urlsafe",
});
