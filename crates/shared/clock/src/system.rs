use chrono::{Duration, Utc};
use expert_core::Timestamp;
use expert_ports::Clock;

/// Wall-clock UTC, optionally shifted by a fixed skew
///
/// Exchanges close bars on their own clock; when the host drifts from it,
/// set the measured difference with [`SystemClock::with_skew`] so aligned
/// bar drivers fire on the exchange's boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    skew: Duration,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `skew` is added to every reading (exchange time minus host time)
    pub fn with_skew(skew: Duration) -> Self {
        Self { skew }
    }

    pub fn skew(&self) -> Duration {
        self.skew
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now() + self.skew
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
