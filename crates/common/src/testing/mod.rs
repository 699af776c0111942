//! Testing utilities and helpers
//!
//! - **[`time`]**: the [`Clock`] abstraction. Production code takes an
//!   `Arc<dyn Clock>` so TTL and schedule logic can be driven by
//!   [`MockClock`] in tests.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use auditvault_common::testing::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(301));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(301));
//! ```

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
