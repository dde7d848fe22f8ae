use chrono::Duration;
use expert_core::Timestamp;
use expert_ports::Clock;
use std::sync::{Arc, Mutex, PoisonError};

/// Clock frozen at a chosen instant
///
/// Time only changes through [`ManualClock::advance`] or
/// [`ManualClock::set_time`]. Shared by `Arc` between the test and the
/// driver under test.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(start),
        })
    }

    /// Move time forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += duration;
    }

    /// Jump to an explicit time (may go backwards)
    pub fn set_time(&self, time: Timestamp) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
