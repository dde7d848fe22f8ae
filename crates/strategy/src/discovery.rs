//! Callback Discovery
//!
//! Walks a strategy module's export table once at process start and binds
//! every tagged export to the kind whose catalog name matches its tag
//! (case-insensitive). Untagged helpers and unknown tags are skipped.

use crate::callback::RegisteredCallback;
use crate::module::StrategyModule;
use crate::registry::EventRegistry;
use expert_core::EventKind;

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Exports bound to a kind
    pub registered: usize,
    /// Exports matching a kind but turned away by the registry
    pub rejected: usize,
    /// Helpers and exports with unknown tags
    pub ignored: usize,
}

pub struct CallbackDiscovery;

impl CallbackDiscovery {
    /// Populate `registry` from `module`'s exports
    pub fn discover(module: &dyn StrategyModule, registry: &mut EventRegistry) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for export in module.exports() {
            let kind = export.tag.as_deref().and_then(EventKind::from_name);
            let (Some(kind), Some(handler)) = (kind, export.handler) else {
                log::trace!("[{}] Skipping export '{}'", module.name(), export.name);
                report.ignored += 1;
                continue;
            };

            let mut callback = RegisteredCallback::new(export.name, handler);
            callback.schedule = export.schedule;

            if registry.register(kind, callback) {
                report.registered += 1;
            } else {
                report.rejected += 1;
            }
        }

        log::info!(
            "[{}] Discovered {} callbacks ({} rejected, {} ignored)",
            module.name(),
            report.registered,
            report.rejected,
            report.ignored
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Handler, ScheduleSpec};
    use crate::module::Export;

    struct Table(Vec<Export>);

    impl StrategyModule for Table {
        fn name(&self) -> &str {
            "table"
        }

        fn exports(&self) -> Vec<Export> {
            self.0.clone()
        }
    }

    fn noop_sync() -> Handler {
        Handler::sync(|_| Ok(()))
    }

    fn noop_async() -> Handler {
        Handler::async_fn(|_| async { Ok(()) })
    }

    #[test]
    fn test_tags_match_case_insensitively() {
        let module = Table(vec![
            Export::tagged("init", "ON_INIT", noop_sync()),
            Export::tagged("hourly", "On_Bar", noop_async())
                .with_schedule(ScheduleSpec::Bar("1h".into())),
        ]);
        let mut registry = EventRegistry::new();
        let report = CallbackDiscovery::discover(&module, &mut registry);

        assert_eq!(report.registered, 2);
        assert_eq!(registry.callbacks(EventKind::Init)[0].id.as_str(), "init");
        let bar = &registry.callbacks(EventKind::Bar)[0];
        assert_eq!(bar.schedule, Some(ScheduleSpec::Bar("1h".into())));
    }

    #[test]
    fn test_helpers_and_unknown_tags_are_ignored() {
        let module = Table(vec![
            Export::helper("compute_sma"),
            Export::tagged("mystery", "on_funding", noop_async()),
        ]);
        let mut registry = EventRegistry::new();
        let report = CallbackDiscovery::discover(&module, &mut registry);

        assert_eq!(report.ignored, 2);
        assert_eq!(registry.total_callbacks(), 0);
    }

    #[test]
    fn test_overflow_counted_not_fatal() {
        let module = Table(vec![
            Export::tagged("tick_a", "on_tick", noop_async()),
            Export::tagged("tick_b", "on_tick", noop_async()),
        ]);
        let mut registry = EventRegistry::new();
        let report = CallbackDiscovery::discover(&module, &mut registry);

        assert_eq!(report.registered, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(registry.callbacks(EventKind::Tick)[0].id.as_str(), "tick_a");
    }

    #[test]
    fn test_empty_module_is_not_an_error() {
        let mut registry = EventRegistry::new();
        let report = CallbackDiscovery::discover(&Table(Vec::new()), &mut registry);
        assert_eq!(report, DiscoveryReport::default());
        assert!(registry.callbacks(EventKind::Init).is_empty());
    }
}
