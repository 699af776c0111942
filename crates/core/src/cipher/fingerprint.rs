//! Content fingerprint for external ledger anchoring

use auditvault_common::security::content_digest;
use auditvault_domain::{Result, SecurityEvent};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

/// `"0x"` followed by the hex SHA-256 of the event's canonical JSON.
///
/// Covers the identity fields and the sealed payload, never plaintext
/// sensitive values, so the fingerprint can leave the process. Object keys
/// serialize in sorted order, which keeps the encoding stable.
pub fn content_fingerprint(event: &SecurityEvent) -> Result<String> {
    let sealed = event.sealed.as_ref().map(|sealed| {
        json!({
            "nonce": hex::encode(sealed.nonce),
            "tag": hex::encode(sealed.tag),
            "ciphertext": STANDARD.encode(&sealed.ciphertext),
        })
    });

    let canonical = json!({
        "id": event.id,
        "event_type": event.event_type,
        "severity": event.severity,
        "occurred_at": event.occurred_at,
        "user_id": event.user_id,
        "sealed": sealed,
    });

    Ok(content_digest(&serde_json::to_vec(&canonical)?))
}
