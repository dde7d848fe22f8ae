//! Async Task Runner - executes the callbacks of one event kind
//!
//! - SYNC kinds: callbacks run inline, in registration order
//! - ASYNC kinds: callbacks and attached listeners are spawned on a
//!   [`JoinSet`] and awaited together
//!
//! Every callback is attempted even when a sibling fails. Errors and panics
//! are collected into a [`RunReport`], logged with kind and callback
//! identity, and forwarded to the strategy's `on_error` handlers.
//!
//! Streaming events are routed to one lane per kind. Lanes drain
//! concurrently, so a slow handler only holds back later events of its own
//! kind.

use crate::scheduler::ScheduleDriver;
use expert_core::{ErrorReport, EventKind, EventPayload, ProcessStateCell, StreamEvent};
use expert_ports::{CallbackError, CallbackResult, StopSignal};
use expert_strategy::{EventRegistry, Handler, RegisteredCallback, SyncFn};
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One failed callback
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackFailure {
    pub callback: String,
    pub error: CallbackError,
}

/// Outcome of running one event kind
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub kind: EventKind,
    /// Callbacks and listeners invoked
    pub attempted: usize,
    pub failures: Vec<CallbackFailure>,
}

impl RunReport {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            attempted: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, callback: impl Into<String>, result: CallbackResult) {
        self.attempted += 1;
        if let Err(error) = result {
            self.failures.push(CallbackFailure {
                callback: callback.into(),
                error,
            });
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// Executes registry callbacks; cheap to clone, shares the frozen registry
#[derive(Clone)]
pub struct AsyncTaskRunner {
    registry: Arc<EventRegistry>,
    state: Option<Arc<ProcessStateCell>>,
}

impl AsyncTaskRunner {
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self {
            registry,
            state: None,
        }
    }

    /// Gate streaming dispatch on the owning process state
    pub fn with_state(mut self, state: Arc<ProcessStateCell>) -> Self {
        self.state = Some(state);
        self
    }

    /// Whether streaming events may reach callbacks right now
    pub fn accepts_events(&self) -> bool {
        self.state
            .as_ref()
            .is_none_or(|state| state.get().accepts_events())
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Run every callback of `kind`
    pub async fn run(&self, kind: EventKind, payload: EventPayload) -> RunReport {
        if !kind.is_async() {
            return self.run_sync(kind, &payload);
        }
        let report = self
            .fan_out(kind, self.registry.callbacks(kind), payload)
            .await;
        self.finish(report)
    }

    /// Run a single scheduled callback of `kind` plus the kind's listeners
    pub async fn run_callback(
        &self,
        kind: EventKind,
        callback: &RegisteredCallback,
        payload: EventPayload,
    ) -> RunReport {
        let report = self
            .fan_out(kind, std::slice::from_ref(callback), payload)
            .await;
        self.finish(report)
    }

    /// Run a SYNC kind inline on the calling thread
    pub fn run_sync(&self, kind: EventKind, payload: &EventPayload) -> RunReport {
        let mut report = RunReport::new(kind);
        for callback in self.registry.callbacks(kind) {
            let result = match &callback.handler {
                Handler::Sync(f) => invoke_sync(f.as_ref(), payload),
                Handler::Async(_) => Err(CallbackError::failed(
                    "async handler cannot run on a sync kind",
                )),
            };
            report.record(callback.id.as_str(), result);
        }
        self.finish(report)
    }

    /// Run `kind` at most once per process.
    ///
    /// Returns `None` without invoking anything when the kind already ran.
    pub fn run_once(&self, kind: EventKind, payload: &EventPayload) -> Option<RunReport> {
        if !self.registry.mark_done(kind) {
            log::warn!("Process '{}' already ran, ignoring", kind);
            return None;
        }
        Some(self.run_sync(kind, payload))
    }

    /// Run `kind` from a thread without a runtime
    ///
    /// ASYNC kinds get a private current-thread runtime for the duration of
    /// the call. Must not be called from inside a tokio runtime.
    pub fn run_blocking(&self, kind: EventKind, payload: EventPayload) -> std::io::Result<RunReport> {
        if !kind.is_async() {
            return Ok(self.run_sync(kind, &payload));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run(kind, payload)))
    }

    /// Drive every schedule driver and the stream dispatch loop until stop
    ///
    /// This is the single joined await the scheduling thread blocks on.
    pub async fn gather_all(
        &self,
        drivers: &[Arc<ScheduleDriver>],
        events: mpsc::Receiver<StreamEvent>,
        stop: StopSignal,
    ) {
        let loops: Vec<_> = drivers
            .iter()
            .map(|driver| {
                let stop = stop.clone();
                async move {
                    if let Err(e) = driver.run(self, stop).await {
                        log::error!("[{}] {}", driver.callback_id(), e);
                    }
                }
            })
            .collect();
        let dispatcher = self.dispatch_stream(events, stop);

        log::debug!("Gathering {} drivers and the stream dispatcher", loops.len());
        tokio::join!(join_all(loops), dispatcher);
        log::debug!("All drivers and the stream dispatcher finished");
    }

    /// Route streaming events to their kind until stop or the sink closes
    pub async fn dispatch_stream(&self, mut events: mpsc::Receiver<StreamEvent>, mut stop: StopSignal) {
        let mut lanes = BTreeMap::new();
        let mut workers = Vec::new();
        for kind in EventKind::ALL.into_iter().filter(|kind| kind.is_streaming()) {
            let (tx, rx) = mpsc::unbounded_channel();
            lanes.insert(kind, tx);
            workers.push(self.drain_lane(kind, rx, stop.clone()));
        }

        // Dropping the lane senders lets each worker finish its backlog and exit
        let router = async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = stop.stopped() => break,
                    event = events.recv() => event,
                };
                let Some(event) = event else {
                    log::debug!("Event stream closed");
                    break;
                };
                let kind = event.kind();
                match lanes.get(&kind) {
                    Some(lane) => {
                        if lane.send(event).is_err() {
                            log::debug!("[{}] Lane closed, event dropped", kind);
                        }
                    }
                    None => log::warn!("[{}] Not a streaming kind, event dropped", kind),
                }
            }
        };

        tokio::join!(router, join_all(workers));
    }

    async fn drain_lane(
        &self,
        kind: EventKind,
        mut lane: mpsc::UnboundedReceiver<StreamEvent>,
        mut stop: StopSignal,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                event = lane.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            if !self.accepts_events() {
                log::debug!("[{}] Process not initialized, event for {:?} dropped", kind, event.symbol());
                continue;
            }
            log::trace!("Dispatching {} event {:?}", kind, event.symbol());
            self.run(kind, EventPayload::Stream(event)).await;
        }
    }

    async fn fan_out(
        &self,
        kind: EventKind,
        callbacks: &[RegisteredCallback],
        payload: EventPayload,
    ) -> RunReport {
        let mut report = RunReport::new(kind);
        let mut tasks = JoinSet::new();

        for callback in callbacks {
            let id = callback.id.to_string();
            match &callback.handler {
                Handler::Async(f) => {
                    let f = Arc::clone(f);
                    let payload = payload.clone();
                    tasks.spawn(guarded(id, async move { f(payload).await }));
                }
                Handler::Sync(f) => report.record(id, invoke_sync(f.as_ref(), &payload)),
            }
        }

        for listener in self.registry.instances(kind) {
            let listener = Arc::clone(listener);
            let payload = payload.clone();
            let id = format!("{}(instance)", listener.name());
            tasks.spawn(guarded(id, async move { listener.on_event(&payload).await }));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => report.record(id, result),
                Err(e) => report.record("<task>", Err(CallbackError::Panicked(e.to_string()))),
            }
        }
        report
    }

    /// Log failures and hand them to `on_error`
    fn finish(&self, report: RunReport) -> RunReport {
        for failure in &report.failures {
            log::error!(
                "[{}] Callback '{}' failed: {}",
                report.kind,
                failure.callback,
                failure.error
            );
        }

        if report.kind == EventKind::Error || report.failures.is_empty() {
            return report;
        }

        for failure in &report.failures {
            let payload = EventPayload::Error(ErrorReport {
                kind: report.kind,
                callback: failure.callback.clone(),
                message: failure.error.to_string(),
            });
            self.run_sync(EventKind::Error, &payload);
        }
        report
    }
}

fn invoke_sync(f: &SyncFn, payload: &EventPayload) -> CallbackResult {
    panic::catch_unwind(AssertUnwindSafe(|| f(payload)))
        .unwrap_or_else(|panic| Err(CallbackError::Panicked(panic_message(panic))))
}

async fn guarded<F>(id: String, future: F) -> (String, CallbackResult)
where
    F: Future<Output = CallbackResult>,
{
    let result = AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(CallbackError::Panicked(panic_message(panic))));
    (id, result)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
