use expert_core::Timestamp;

/// Port for time abstraction
///
/// Bar drivers ask the clock for "now" when computing the next aligned
/// boundary, so tests can pin wall time while tokio time runs separately.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
