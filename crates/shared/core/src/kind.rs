//! Event kind catalog
//!
//! Immutable descriptor table of every event kind a strategy may react to.
//! Runtime state (callbacks, listeners, flags) lives in the strategy crate's
//! registry, keyed by [`EventKind`]; nothing here is mutable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How callbacks of a kind are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Concurrency {
    /// Invoked inline, in registration order, on the caller's thread
    Sync,
    /// Scheduled as concurrent cooperative tasks
    Async,
}

/// Static descriptor of one event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKindSpec {
    pub name: &'static str,
    pub max_callbacks: usize,
    pub concurrency: Concurrency,
    /// Whether stateful listener instances may be attached
    pub accepts_instances: bool,
}

/// Supported event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Init,
    Deinit,
    Tick,
    Bar,
    Timer,
    Transaction,
    Book,
    Order,
    Position,
    Error,
    Account,
    BacktestInit,
    BacktestDeinit,
    Backtest,
    BacktestPass,
}

const fn spec(
    name: &'static str,
    max_callbacks: usize,
    concurrency: Concurrency,
    accepts_instances: bool,
) -> EventKindSpec {
    EventKindSpec {
        name,
        max_callbacks,
        concurrency,
        accepts_instances,
    }
}

impl EventKind {
    /// Every kind in catalog order
    pub const ALL: [EventKind; 15] = [
        EventKind::Init,
        EventKind::Deinit,
        EventKind::Tick,
        EventKind::Bar,
        EventKind::Timer,
        EventKind::Transaction,
        EventKind::Book,
        EventKind::Order,
        EventKind::Position,
        EventKind::Error,
        EventKind::Account,
        EventKind::BacktestInit,
        EventKind::BacktestDeinit,
        EventKind::Backtest,
        EventKind::BacktestPass,
    ];

    /// Catalog descriptor for this kind
    pub const fn spec(self) -> EventKindSpec {
        use Concurrency::{Async, Sync};
        match self {
            EventKind::Init => spec("on_init", 1, Sync, false),
            EventKind::Deinit => spec("on_deinit", 1, Sync, false),
            EventKind::Tick => spec("on_tick", 1, Async, false),
            EventKind::Bar => spec("on_bar", 5, Async, true),
            EventKind::Timer => spec("on_timer", 5, Async, true),
            EventKind::Transaction => spec("on_transaction", 1, Async, false),
            EventKind::Book => spec("on_book", 1, Async, true),
            EventKind::Order => spec("on_order", 1, Async, true),
            EventKind::Position => spec("on_position", 1, Async, true),
            EventKind::Error => spec("on_error", 1, Sync, false),
            EventKind::Account => spec("on_account", 1, Async, true),
            EventKind::BacktestInit => spec("on_backtest_init", 1, Sync, false),
            EventKind::BacktestDeinit => spec("on_backtest_deinit", 1, Sync, false),
            EventKind::Backtest => spec("on_backtest", 1, Async, true),
            EventKind::BacktestPass => spec("on_backtest_pass", 1, Sync, false),
        }
    }

    pub const fn name(self) -> &'static str {
        self.spec().name
    }

    pub const fn max_callbacks(self) -> usize {
        self.spec().max_callbacks
    }

    pub const fn concurrency(self) -> Concurrency {
        self.spec().concurrency
    }

    pub const fn accepts_instances(self) -> bool {
        self.spec().accepts_instances
    }

    pub fn is_async(self) -> bool {
        self.concurrency() == Concurrency::Async
    }

    /// Kinds fed by the market connectivity collaborator
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            EventKind::Tick
                | EventKind::Book
                | EventKind::Order
                | EventKind::Position
                | EventKind::Account
                | EventKind::Transaction
        )
    }

    /// Resolve a registration tag (e.g. `"ON_BAR"`, `"on_bar"`) to a kind
    pub fn from_name(name: &str) -> Option<EventKind> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_limits() {
        assert_eq!(EventKind::Init.max_callbacks(), 1);
        assert_eq!(EventKind::Bar.max_callbacks(), 5);
        assert_eq!(EventKind::Timer.max_callbacks(), 5);
        for kind in EventKind::ALL {
            assert!(kind.max_callbacks() >= 1, "{kind} must accept a callback");
        }
    }

    #[test]
    fn test_lifecycle_kinds_are_sync() {
        assert_eq!(EventKind::Init.concurrency(), Concurrency::Sync);
        assert_eq!(EventKind::Deinit.concurrency(), Concurrency::Sync);
        assert_eq!(EventKind::Error.concurrency(), Concurrency::Sync);
        assert!(EventKind::Tick.is_async());
        assert!(EventKind::Bar.is_async());
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(EventKind::from_name("on_bar"), Some(EventKind::Bar));
        assert_eq!(EventKind::from_name("ON_TIMER"), Some(EventKind::Timer));
        assert_eq!(EventKind::from_name(" On_Init "), Some(EventKind::Init));
        assert_eq!(EventKind::from_name("compute_sma"), None);
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in EventKind::ALL.iter().enumerate() {
            for b in &EventKind::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_streaming_kinds() {
        let streaming: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|k| k.is_streaming())
            .collect();
        assert_eq!(streaming.len(), 6);
        assert!(!EventKind::Bar.is_streaming());
        assert!(streaming.iter().all(|k| k.is_async()));
    }
}
