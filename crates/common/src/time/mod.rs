//! Time utilities and abstractions
//!
//! - **[`clock`]**: Real and mock clocks so time-dependent code (session
//!   expiry, idle tracking) can be tested without waiting
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use std::time::Duration;
//!
//! use warden_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! # }
//! ```

pub mod clock;

// Re-export commonly used items
pub use clock::{Clock, MockClock, SystemClock};
