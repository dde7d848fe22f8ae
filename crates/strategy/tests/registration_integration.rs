//! Integration test: registration limits through builder and discovery
//!
//! Installs a capturing logger so overflow warnings can be counted.

use expert_core::EventKind;
use expert_strategy::{
    CallbackDiscovery, EventRegistry, Handler, RegisteredCallback, ScheduleSpec, StrategyBuilder,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, OnceLock};

struct CapturingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn logger() -> &'static CapturingLogger {
    static LOGGER: OnceLock<CapturingLogger> = OnceLock::new();
    let logger = LOGGER.get_or_init(|| CapturingLogger {
        records: Mutex::new(Vec::new()),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    logger
}

fn overflow_warnings(callback: &str) -> usize {
    logger()
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, message)| {
            *level == Level::Warn && message.starts_with("Too many callbacks") && message.contains(callback)
        })
        .count()
}

/// Exactly max_callbacks bars fit; the next one is dropped and logged once
#[test]
fn test_bar_overflow_logged_once() {
    logger();

    let mut builder = StrategyBuilder::new("many_bars");
    for i in 0..EventKind::Bar.max_callbacks() {
        builder = builder.on_bar(&format!("bar_{i}"), "1m", |_| async { Ok(()) });
    }
    let strategy = builder
        .on_bar("bar_overflow", "1h", |_| async { Ok(()) })
        .build();

    let mut registry = EventRegistry::new();
    let report = CallbackDiscovery::discover(&strategy, &mut registry);

    assert_eq!(report.registered, 5);
    assert_eq!(report.rejected, 1);
    let bars = registry.callbacks(EventKind::Bar);
    assert_eq!(bars.len(), 5);
    assert!(bars.iter().all(|cb| cb.schedule == Some(ScheduleSpec::Bar("1m".into()))));
    assert_eq!(overflow_warnings("bar_overflow"), 1);
}

/// After discovery, a direct register() beyond the limit leaves the list unchanged
#[test]
fn test_register_after_discovery_respects_limit() {
    logger();

    let strategy = StrategyBuilder::new("one_tick")
        .on_tick("tick", |_| async { Ok(()) })
        .build();
    let mut registry = EventRegistry::new();
    CallbackDiscovery::discover(&strategy, &mut registry);

    let extra = RegisteredCallback::new("late_tick", Handler::async_fn(|_| async { Ok(()) }));
    assert!(!registry.register(EventKind::Tick, extra));

    let ticks = registry.callbacks(EventKind::Tick);
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].id.as_str(), "tick");
    assert_eq!(overflow_warnings("late_tick"), 1);
}

/// Every kind stays within its limit whatever the strategy declares
#[test]
fn test_every_kind_within_limit() {
    logger();

    let mut builder = StrategyBuilder::new("greedy");
    for i in 0..3 {
        builder = builder
            .on_init(&format!("init_{i}"), |_| Ok(()))
            .on_deinit(&format!("deinit_{i}"), |_| Ok(()))
            .on_order(&format!("order_{i}"), |_| async { Ok(()) })
            .on_account(&format!("account_{i}"), |_| async { Ok(()) });
    }
    for i in 0..7 {
        builder = builder.on_timer(&format!("timer_{i}"), 1.0, |_| async { Ok(()) });
    }

    let mut registry = EventRegistry::new();
    CallbackDiscovery::discover(&builder.build(), &mut registry);

    for kind in EventKind::ALL {
        assert!(registry.callbacks(kind).len() <= kind.max_callbacks(), "{kind} over limit");
    }
    assert_eq!(registry.callbacks(EventKind::Timer).len(), 5);
    assert_eq!(registry.callbacks(EventKind::Init)[0].id.as_str(), "init_0");
}
