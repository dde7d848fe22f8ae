//! Expert Clock Infrastructure
//!
//! Time sources for the dispatch engine:
//!
//! - [`SystemClock`]: wall-clock UTC, used in production
//! - [`ManualClock`]: frozen time that only moves when told to, used to
//!   test calendar-aligned bar scheduling deterministically
//!
//! ## Usage
//!
//! ```ignore
//! use expert_clock::{Clock, ManualClock};
//! use chrono::{Duration, TimeZone, Timelike, Utc};
//!
//! let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap());
//! clock.advance(Duration::minutes(30));
//! assert_eq!(clock.now().minute(), 30);
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use expert_ports::Clock;
