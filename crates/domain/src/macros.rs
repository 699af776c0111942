//! Declarative helpers for domain types
//!
//! - [`impl_domain_status_conversions!`]: Display + case-insensitive FromStr
//!   for plain status enums
//! - [`sensitive_field!`]: one [`FieldDescriptor`](crate::FieldDescriptor)
//!   entry binding a field name to its value and `<field>_encrypted` flag
//!
//! # Example
//!
//! ```rust
//! use auditvault_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum TierState {
//!     Connected,
//!     Degraded,
//! }
//!
//! impl_domain_status_conversions!(TierState {
//!     Connected => "connected",
//!     Degraded => "degraded",
//! });
//!
//! assert_eq!(TierState::Degraded.to_string(), "degraded");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to lowercase strings
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their string
///   representations
///
/// # Features
///
/// - Case-insensitive parsing (e.g., "PENDING", "pending", "Pending" all work)
/// - Consistent lowercase string output
/// - Descriptive error messages with enum name
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

/// Builds a [`FieldDescriptor`](crate::FieldDescriptor) for a record whose
/// sensitive value lives in `Option<String>` field `$value` and whose flag
/// lives in `bool` field `$flag`.
///
/// ```rust,ignore
/// static FIELDS: [FieldDescriptor<Incident>; 1] =
///     [sensitive_field!(Incident, "notes", notes, notes_encrypted)];
/// ```
#[macro_export]
macro_rules! sensitive_field {
    ($record:ty, $name:literal, $value:ident, $flag:ident) => {
        $crate::FieldDescriptor::<$record> {
            name: $name,
            value: |record: &$record| record.$value.as_deref(),
            set_value: |record: &mut $record, value: Option<String>| record.$value = value,
            is_encrypted: |record: &$record| record.$flag,
            set_encrypted: |record: &mut $record, flag: bool| record.$flag = flag,
        }
    };
}
