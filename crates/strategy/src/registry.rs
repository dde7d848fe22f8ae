//! Event Registry - per-kind runtime store
//!
//! One [`RegistryEntry`] per catalog kind holding the bound callbacks, the
//! attached listener instances and the `is_done` flag.
//!
//! The registry is mutated only during discovery and setup (`&mut self`),
//! then frozen behind an `Arc` for the scheduling thread. `is_done` is the
//! only field written after that point, hence the atomic.

use crate::callback::RegisteredCallback;
use crate::listener::EventListener;
use expert_core::EventKind;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable runtime state of one event kind
pub struct RegistryEntry {
    kind: EventKind,
    callbacks: Vec<RegisteredCallback>,
    instances: Vec<Arc<dyn EventListener>>,
    rejected: usize,
    done: AtomicBool,
}

impl RegistryEntry {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            callbacks: Vec::new(),
            instances: Vec::new(),
            rejected: 0,
            done: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Callbacks in registration order
    pub fn callbacks(&self) -> &[RegisteredCallback] {
        &self.callbacks
    }

    /// Attached listeners, oldest first
    pub fn instances(&self) -> &[Arc<dyn EventListener>] {
        &self.instances
    }

    /// Number of registrations turned away by this entry
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.callbacks.len() >= self.kind.max_callbacks()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("kind", &self.kind)
            .field("callbacks", &self.callbacks)
            .field("instances", &self.instances.len())
            .field("rejected", &self.rejected)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Keyed store of every kind's [`RegistryEntry`]
#[derive(Debug)]
pub struct EventRegistry {
    entries: BTreeMap<EventKind, RegistryEntry>,
}

impl EventRegistry {
    /// Create a registry with an empty entry for every catalog kind
    pub fn new() -> Self {
        let entries = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, RegistryEntry::new(kind)))
            .collect();
        Self { entries }
    }

    pub fn entry(&self, kind: EventKind) -> &RegistryEntry {
        // Every kind is inserted in `new`
        &self.entries[&kind]
    }

    fn entry_mut(&mut self, kind: EventKind) -> &mut RegistryEntry {
        self.entries
            .entry(kind)
            .or_insert_with(|| RegistryEntry::new(kind))
    }

    /// Bind a callback to `kind`.
    ///
    /// Returns `false` and leaves the entry untouched when the kind is at
    /// capacity or the handler's concurrency class does not match the kind.
    pub fn register(&mut self, kind: EventKind, callback: RegisteredCallback) -> bool {
        let entry = self.entry_mut(kind);

        if callback.handler.concurrency() != kind.concurrency() {
            entry.rejected += 1;
            log::warn!(
                "Rejected callback '{}' for '{}': handler is {:?}, kind requires {:?}",
                callback.id,
                kind,
                callback.handler.concurrency(),
                kind.concurrency()
            );
            return false;
        }

        if entry.is_full() {
            entry.rejected += 1;
            log::warn!(
                "Too many callbacks for '{}': dropping '{}' (limit {})",
                kind,
                callback.id,
                kind.max_callbacks()
            );
            return false;
        }

        log::debug!("Registering callback for '{}:{}()'", kind, callback.id);
        entry.callbacks.push(callback);
        true
    }

    /// Attach a listener instance (pushed on top of the kind's stack)
    pub fn register_instance(&mut self, kind: EventKind, listener: Arc<dyn EventListener>) -> bool {
        if !kind.accepts_instances() {
            log::error!(
                "Kind '{}' does not accept listener instances ('{}' ignored)",
                kind,
                listener.name()
            );
            return false;
        }

        log::debug!("Instance '{}' added for '{}'", listener.name(), kind);
        self.entry_mut(kind).instances.push(listener);
        true
    }

    /// Detach the most recently attached listener
    pub fn unregister_instance(&mut self, kind: EventKind) -> Option<Arc<dyn EventListener>> {
        if !kind.accepts_instances() {
            log::error!("Kind '{}' does not accept listener instances", kind);
            return None;
        }

        let listener = self.entry_mut(kind).instances.pop()?;
        log::debug!("Instance '{}' removed for '{}'", listener.name(), kind);
        Some(listener)
    }

    pub fn has_instances(&self, kind: EventKind) -> bool {
        !self.entry(kind).instances.is_empty()
    }

    pub fn callbacks(&self, kind: EventKind) -> &[RegisteredCallback] {
        self.entry(kind).callbacks()
    }

    pub fn instances(&self, kind: EventKind) -> &[Arc<dyn EventListener>] {
        self.entry(kind).instances()
    }

    /// Mark `kind` as having run.
    ///
    /// Returns `true` only for the call that flipped the flag; later calls
    /// are no-ops returning `false`.
    pub fn mark_done(&self, kind: EventKind) -> bool {
        let first = !self.entry(kind).done.swap(true, Ordering::AcqRel);
        if first {
            log::debug!("Process '{}' is done", kind);
        }
        first
    }

    pub fn is_done(&self, kind: EventKind) -> bool {
        self.entry(kind).is_done()
    }

    /// Total callbacks bound across all kinds
    pub fn total_callbacks(&self) -> usize {
        self.entries.values().map(|e| e.callbacks.len()).sum()
    }

    /// Entries that have at least one callback or listener
    pub fn active_kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.entries
            .values()
            .filter(|e| !e.callbacks.is_empty() || !e.instances.is_empty())
            .map(|e| e.kind)
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Handler;
    use async_trait::async_trait;
    use expert_core::EventPayload;
    use expert_ports::CallbackResult;

    fn sync_cb(name: &str) -> RegisteredCallback {
        RegisteredCallback::new(name, Handler::sync(|_| Ok(())))
    }

    fn async_cb(name: &str) -> RegisteredCallback {
        RegisteredCallback::new(name, Handler::async_fn(|_| async { Ok(()) }))
    }

    struct Named(&'static str);

    #[async_trait]
    impl EventListener for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn on_event(&self, _payload: &EventPayload) -> CallbackResult {
            Ok(())
        }
    }

    #[test]
    fn test_register_up_to_capacity() {
        let mut registry = EventRegistry::new();
        for i in 0..EventKind::Bar.max_callbacks() {
            assert!(registry.register(EventKind::Bar, async_cb(&format!("bar_{i}"))));
        }
        assert_eq!(registry.callbacks(EventKind::Bar).len(), 5);
        assert!(registry.entry(EventKind::Bar).is_full());
    }

    #[test]
    fn test_overflow_rejected_first_n_wins() {
        let mut registry = EventRegistry::new();
        assert!(registry.register(EventKind::Init, sync_cb("first")));
        assert!(!registry.register(EventKind::Init, sync_cb("second")));

        let callbacks = registry.callbacks(EventKind::Init);
        assert_eq!(callbacks.len(), 1);
        assert_eq!(callbacks[0].id.as_str(), "first");
        assert_eq!(registry.entry(EventKind::Init).rejected(), 1);
    }

    #[test]
    fn test_class_mismatch_rejected() {
        let mut registry = EventRegistry::new();
        assert!(!registry.register(EventKind::Init, async_cb("async_init")));
        assert!(!registry.register(EventKind::Tick, sync_cb("sync_tick")));
        assert_eq!(registry.total_callbacks(), 0);
    }

    #[test]
    fn test_instances_are_lifo() {
        let mut registry = EventRegistry::new();
        assert!(!registry.has_instances(EventKind::Order));
        assert!(registry.register_instance(EventKind::Order, Arc::new(Named("a"))));
        assert!(registry.register_instance(EventKind::Order, Arc::new(Named("b"))));
        assert!(registry.has_instances(EventKind::Order));

        assert_eq!(registry.unregister_instance(EventKind::Order).unwrap().name(), "b");
        assert_eq!(registry.unregister_instance(EventKind::Order).unwrap().name(), "a");
        assert!(registry.unregister_instance(EventKind::Order).is_none());
    }

    #[test]
    fn test_instances_refused_for_lifecycle_kinds() {
        let mut registry = EventRegistry::new();
        assert!(!registry.register_instance(EventKind::Init, Arc::new(Named("x"))));
        assert!(registry.unregister_instance(EventKind::Init).is_none());
        assert!(!registry.has_instances(EventKind::Init));
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let registry = EventRegistry::new();
        assert!(!registry.is_done(EventKind::Init));
        assert!(registry.mark_done(EventKind::Init));
        assert!(!registry.mark_done(EventKind::Init));
        assert!(registry.is_done(EventKind::Init));
    }

    #[test]
    fn test_active_kinds() {
        let mut registry = EventRegistry::new();
        registry.register(EventKind::Init, sync_cb("init"));
        registry.register_instance(EventKind::Book, Arc::new(Named("book")));
        let active: Vec<_> = registry.active_kinds().collect();
        assert_eq!(active, vec![EventKind::Init, EventKind::Book]);
    }
}
