//! Records carrying sensitive fields and their sealed payload.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::key::KeySource;
use crate::sensitive_field;

/// One AES-256-GCM payload covering every encrypted field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFields {
    pub nonce: [u8; 12],
    pub tag: [u8; 16],
    pub ciphertext: Vec<u8>,
    /// Tier that supplied the key at seal time.
    pub key_source: KeySource,
    pub sealed_at: DateTime<Utc>,
}

/// Accessor table entry for one sensitive field.
///
/// Both encryption and decryption walk the same table so the set of field
/// names cannot drift between directions. Build entries with
/// [`sensitive_field!`](crate::sensitive_field).
pub struct FieldDescriptor<R> {
    pub name: &'static str,
    pub value: fn(&R) -> Option<&str>,
    pub set_value: fn(&mut R, Option<String>),
    pub is_encrypted: fn(&R) -> bool,
    pub set_encrypted: fn(&mut R, bool),
}

impl<R> Clone for FieldDescriptor<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldDescriptor<R> {}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor").field("name", &self.name).finish()
    }
}

/// A persisted record with a declared set of sensitive fields.
pub trait SensitiveRecord: Sized + 'static {
    /// Every field eligible for encryption.
    fn sensitive_fields() -> &'static [FieldDescriptor<Self>];

    fn sealed(&self) -> Option<&SealedFields>;

    fn set_sealed(&mut self, sealed: Option<SealedFields>);

    /// Stable identifier used in logs and migration reports.
    fn record_id(&self) -> String;

    fn field(name: &str) -> Option<&'static FieldDescriptor<Self>> {
        Self::sensitive_fields().iter().find(|descriptor| descriptor.name == name)
    }

    fn field_names() -> Vec<&'static str> {
        Self::sensitive_fields().iter().map(|descriptor| descriptor.name).collect()
    }

    /// True when at least one sensitive field is flagged encrypted.
    fn has_encrypted_fields(&self) -> bool {
        Self::sensitive_fields().iter().any(|descriptor| (descriptor.is_encrypted)(self))
    }
}

/// Security audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub event_type: String,
    pub severity: String,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Option<String>,

    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub action_taken: Option<String>,

    #[serde(default)]
    pub description_encrypted: bool,
    #[serde(default)]
    pub ip_address_encrypted: bool,
    #[serde(default)]
    pub location_encrypted: bool,
    #[serde(default)]
    pub action_taken_encrypted: bool,

    #[serde(default)]
    pub sealed: Option<SealedFields>,
}

static SECURITY_EVENT_FIELDS: [FieldDescriptor<SecurityEvent>; 4] = [
    sensitive_field!(SecurityEvent, "description", description, description_encrypted),
    sensitive_field!(SecurityEvent, "ip_address", ip_address, ip_address_encrypted),
    sensitive_field!(SecurityEvent, "location", location, location_encrypted),
    sensitive_field!(SecurityEvent, "action_taken", action_taken, action_taken_encrypted),
];

impl SecurityEvent {
    pub fn new(event_type: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            severity: severity.into(),
            occurred_at: Utc::now(),
            user_id: None,
            description: None,
            ip_address: None,
            location: None,
            action_taken: None,
            description_encrypted: false,
            ip_address_encrypted: false,
            location_encrypted: false,
            action_taken_encrypted: false,
            sealed: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_action_taken(mut self, action_taken: impl Into<String>) -> Self {
        self.action_taken = Some(action_taken.into());
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

impl SensitiveRecord for SecurityEvent {
    fn sensitive_fields() -> &'static [FieldDescriptor<Self>] {
        &SECURITY_EVENT_FIELDS
    }

    fn sealed(&self) -> Option<&SealedFields> {
        self.sealed.as_ref()
    }

    fn set_sealed(&mut self, sealed: Option<SealedFields>) {
        self.sealed = sealed;
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}
