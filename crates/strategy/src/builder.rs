//! Typed registration API
//!
//! One method per event kind. Each method tags the export with the kind's
//! catalog name, which is exactly what discovery matches on, so a strategy
//! built here always resolves the way it reads.
//!
//! ```rust,ignore
//! let strategy = StrategyBuilder::new("sma_cross")
//!     .on_init("init", |_| Ok(()))
//!     .on_bar("hourly", "1h", |payload| async move { Ok(()) })
//!     .on_timer("heartbeat", 1.0, |_| async { Ok(()) })
//!     .on_deinit("deinit", |payload| Ok(()))
//!     .build();
//! ```

use crate::callback::{Handler, ScheduleSpec};
use crate::module::{Export, StrategyModule};
use expert_core::{EventKind, EventPayload};
use expert_ports::CallbackResult;
use std::future::Future;

/// A strategy assembled with [`StrategyBuilder`]
#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    exports: Vec<Export>,
}

impl Strategy {
    pub fn builder(name: impl Into<String>) -> StrategyBuilder {
        StrategyBuilder::new(name)
    }
}

impl StrategyModule for Strategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn exports(&self) -> Vec<Export> {
        self.exports.clone()
    }
}

pub struct StrategyBuilder {
    name: String,
    exports: Vec<Export>,
}

macro_rules! sync_registration {
    ($(#[$doc:meta])* $method:ident => $kind:expr) => {
        $(#[$doc])*
        pub fn $method<F>(self, name: &str, f: F) -> Self
        where
            F: Fn(&EventPayload) -> CallbackResult + Send + Sync + 'static,
        {
            self.tagged($kind, name, Handler::sync(f), None)
        }
    };
}

macro_rules! async_registration {
    ($(#[$doc:meta])* $method:ident => $kind:expr) => {
        $(#[$doc])*
        pub fn $method<F, Fut>(self, name: &str, f: F) -> Self
        where
            F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = CallbackResult> + Send + 'static,
        {
            self.tagged($kind, name, Handler::async_fn(f), None)
        }
    };
}

impl StrategyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: Vec::new(),
        }
    }

    fn tagged(
        mut self,
        kind: EventKind,
        name: &str,
        handler: Handler,
        schedule: Option<ScheduleSpec>,
    ) -> Self {
        let mut export = Export::tagged(name, kind.name(), handler);
        export.schedule = schedule;
        self.exports.push(export);
        self
    }

    sync_registration!(
        /// Runs once, before any streaming or scheduled callback
        on_init => EventKind::Init
    );
    sync_registration!(
        /// Runs once on shutdown, receives the shutdown reason
        on_deinit => EventKind::Deinit
    );
    sync_registration!(
        /// Receives an [`expert_core::ErrorReport`] for every failed callback
        on_error => EventKind::Error
    );
    sync_registration!(on_backtest_init => EventKind::BacktestInit);
    sync_registration!(on_backtest_deinit => EventKind::BacktestDeinit);
    sync_registration!(on_backtest_pass => EventKind::BacktestPass);

    async_registration!(on_tick => EventKind::Tick);
    async_registration!(on_book => EventKind::Book);
    async_registration!(on_order => EventKind::Order);
    async_registration!(on_position => EventKind::Position);
    async_registration!(on_account => EventKind::Account);
    async_registration!(on_transaction => EventKind::Transaction);
    async_registration!(on_backtest => EventKind::Backtest);

    /// Fire on every bar close of `timeframe` (e.g. `"1h"`)
    pub fn on_bar<F, Fut>(self, name: &str, timeframe: &str, f: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        let schedule = ScheduleSpec::Bar(timeframe.to_string());
        self.tagged(EventKind::Bar, name, Handler::async_fn(f), Some(schedule))
    }

    /// Fire every `interval_secs` seconds
    pub fn on_timer<F, Fut>(self, name: &str, interval_secs: f64, f: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        let schedule = ScheduleSpec::Timer(interval_secs);
        self.tagged(EventKind::Timer, name, Handler::async_fn(f), Some(schedule))
    }

    /// Export an untagged helper (ignored by discovery)
    pub fn helper(mut self, name: &str) -> Self {
        self.exports.push(Export::helper(name));
        self
    }

    pub fn build(self) -> Strategy {
        Strategy {
            name: self.name,
            exports: self.exports,
        }
    }
}
