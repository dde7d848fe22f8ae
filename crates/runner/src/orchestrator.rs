//! Process Orchestrator - lifecycle of one strategy process
//!
//! ```text
//!   CREATED ──start()──► INITIALIZED ──spawn threads──► RUNNING
//!      │                      │                            │
//!      └──────────────────────┴────── shutdown(reason) ────┴──► SHUTDOWN
//! ```
//!
//! `start` runs INIT on the caller's thread, then spawns:
//! - the ingestion thread, driving the [`MarketConnector`]
//! - the scheduling thread, a current-thread tokio runtime blocked on
//!   [`AsyncTaskRunner::gather_all`]
//!
//! `shutdown` runs exactly once: it stops the drivers, joins the scheduling
//! thread and runs DEINIT with the reason.

use crate::config::RunnerConfig;
use crate::scheduler::ScheduleDriver;
use crate::signals::wait_for_shutdown_signal;
use crate::task_runner::AsyncTaskRunner;
use expert_clock::SystemClock;
use expert_core::{
    BacktestPass, ConnectionDescriptor, EventKind, EventPayload, ProcessState, ProcessStateCell,
    StreamEvent,
};
use expert_ports::{Clock, EventSink, MarketConnector, ScheduleError, StopSignal};
use expert_strategy::{CallbackDiscovery, EventRegistry, StrategyModule};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Cannot start: process is {0}")]
    NotStartable(ProcessState),

    #[error("Init failed: {failures} callback(s) raised")]
    InitFailed { failures: usize },

    #[error("Failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Signal handling failed: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result of [`ProcessOrchestrator::backtest`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacktestSummary {
    pub passes: u32,
    /// Callback failures across every backtest kind
    pub failures: usize,
}

pub struct ProcessOrchestrator {
    name: String,
    config: RunnerConfig,
    registry: Arc<EventRegistry>,
    clock: Arc<dyn Clock>,
    connector: Option<Box<dyn MarketConnector>>,
    state: Arc<ProcessStateCell>,
    run_id: Option<Uuid>,
    stop_tx: Option<watch::Sender<bool>>,
    drivers: Vec<Arc<ScheduleDriver>>,
    scheduler: Option<JoinHandle<()>>,
    ingestion: Option<JoinHandle<()>>,
    init_attempted: bool,
    shut_down: bool,
}

impl ProcessOrchestrator {
    /// Discover `module`'s callbacks into a fresh registry
    pub fn new(module: &dyn StrategyModule, config: RunnerConfig) -> Self {
        let mut registry = EventRegistry::new();
        CallbackDiscovery::discover(module, &mut registry);
        Self::from_registry(module.name(), registry, config)
    }

    /// Wrap an already populated registry
    pub fn from_registry(name: impl Into<String>, registry: EventRegistry, config: RunnerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            registry: Arc::new(registry),
            clock: Arc::new(SystemClock::new()),
            connector: None,
            state: Arc::new(ProcessStateCell::new()),
            run_id: None,
            stop_tx: None,
            drivers: Vec::new(),
            scheduler: None,
            ingestion: None,
            init_attempted: false,
            shut_down: false,
        }
    }

    pub fn with_connector(mut self, connector: impl MarketConnector) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    /// Id of the current run, assigned by `start`
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Mutable registry access, only before `start`
    pub fn registry_mut(&mut self) -> Option<&mut EventRegistry> {
        if self.state.get() != ProcessState::Created {
            return None;
        }
        Arc::get_mut(&mut self.registry)
    }

    pub fn drivers(&self) -> &[Arc<ScheduleDriver>] {
        &self.drivers
    }

    /// Run INIT and spawn the ingestion and scheduling threads
    ///
    /// Calling `start` on a running process is a logged no-op. A process
    /// that has shut down, including after a failed start, cannot be
    /// started again.
    pub fn start(&mut self, descriptor: &ConnectionDescriptor) -> Result<(), OrchestratorError> {
        match self.state.get() {
            ProcessState::Created => {}
            ProcessState::Initialized | ProcessState::Running => {
                log::warn!(
                    "[{}] start() ignored: process is already {}",
                    self.name,
                    self.state.get()
                );
                return Ok(());
            }
            ProcessState::Shutdown => {
                log::warn!("[{}] start() refused: process is {}", self.name, ProcessState::Shutdown);
                return Err(OrchestratorError::NotStartable(ProcessState::Shutdown));
            }
        }

        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);
        log::info!("[{}] Starting run {} on {}", self.name, run_id, descriptor.exchange);
        log::debug!(
            "[{}] {} callbacks across {:?}, clock {}",
            self.name,
            self.registry.total_callbacks(),
            self.registry.active_kinds().collect::<Vec<_>>(),
            self.clock.name()
        );

        self.drivers = self.build_drivers()?;
        let runner =
            AsyncTaskRunner::new(Arc::clone(&self.registry)).with_state(Arc::clone(&self.state));

        self.init_attempted = true;
        if let Some(report) = runner.run_once(EventKind::Init, &EventPayload::Init) {
            if !report.is_ok() {
                let failures = report.failures.len();
                self.shutdown("init failed");
                return Err(OrchestratorError::InitFailed { failures });
            }
        }
        self.transition(ProcessState::Initialized);

        let (stop_tx, stop) = StopSignal::channel();
        self.stop_tx = Some(stop_tx);
        let (sink, events) = EventSink::channel(self.config.event_channel_capacity);

        if let Err(e) = self.spawn_ingestion(descriptor, sink, stop.clone()) {
            self.shutdown("ingestion spawn failed");
            return Err(e);
        }
        if let Err(e) = self.spawn_scheduler(runner, events, stop) {
            self.shutdown("scheduler spawn failed");
            return Err(e);
        }

        self.transition(ProcessState::Running);
        Ok(())
    }

    /// Signal cooperative stop to drivers, dispatch and connector
    pub fn stop(&self) {
        if let Some(tx) = &self.stop_tx {
            tx.send_replace(true);
        }
        for driver in &self.drivers {
            driver.stop();
        }
        log::debug!("[{}] Stop requested", self.name);
    }

    /// Stop everything and run DEINIT with `reason`; only the first call acts
    pub fn shutdown(&mut self, reason: &str) {
        if self.shut_down {
            log::debug!("[{}] shutdown('{}') ignored: already shut down", self.name, reason);
            return;
        }
        self.shut_down = true;
        log::info!("[{}] Shutting down: {}", self.name, reason);

        self.stop();
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                log::error!("[{}] Scheduling thread panicked", self.name);
            }
        }
        if self.ingestion.take().is_some() {
            log::debug!("[{}] Ingestion thread detached", self.name);
        }

        if self.init_attempted {
            let runner = AsyncTaskRunner::new(Arc::clone(&self.registry));
            if let Some(report) = runner.run_once(EventKind::Deinit, &EventPayload::deinit(reason)) {
                if !report.is_ok() {
                    log::error!(
                        "[{}] Deinit raised {} error(s), continuing shutdown",
                        self.name,
                        report.failures.len()
                    );
                }
            }
        } else {
            log::warn!("[{}] Deinit skipped: process was never initialized", self.name);
        }

        self.transition(ProcessState::Shutdown);
    }

    /// `start`, wait for SIGINT/SIGTERM/SIGQUIT, then `shutdown("signal")`
    pub fn run_until_signal(&mut self, descriptor: &ConnectionDescriptor) -> Result<(), OrchestratorError> {
        self.start(descriptor)?;

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                self.shutdown("runtime unavailable");
                return Err(OrchestratorError::Runtime(e));
            }
        };
        let waited = runtime.block_on(wait_for_shutdown_signal());
        self.shutdown("signal");
        waited.map_err(OrchestratorError::Signal)
    }

    /// Run the backtest lifecycle synchronously on the caller's thread
    ///
    /// `on_backtest_init`, then per pass `on_backtest` and
    /// `on_backtest_pass`, then `on_backtest_deinit`. Only valid before
    /// `start`; the process state is left untouched.
    pub fn backtest(&mut self, passes: u32) -> Result<BacktestSummary, OrchestratorError> {
        if self.state.get() != ProcessState::Created {
            log::warn!(
                "[{}] backtest() ignored: process is already {}",
                self.name,
                self.state.get()
            );
            return Ok(BacktestSummary::default());
        }

        let runner = AsyncTaskRunner::new(Arc::clone(&self.registry));
        let boundary = |pass| EventPayload::Backtest(BacktestPass { pass, total: passes });
        let run = |kind, pass| {
            runner
                .run_blocking(kind, boundary(pass))
                .map(|report| report.failures.len())
                .map_err(OrchestratorError::Runtime)
        };

        log::info!("[{}] Backtest started: {} passes", self.name, passes);
        let mut summary = BacktestSummary::default();
        summary.failures += run(EventKind::BacktestInit, 0)?;

        for pass in 1..=passes {
            summary.failures += run(EventKind::Backtest, pass)?;
            summary.failures += run(EventKind::BacktestPass, pass)?;
            summary.passes = pass;
        }

        summary.failures += run(EventKind::BacktestDeinit, passes)?;
        log::info!(
            "[{}] Backtest finished: {} passes, {} failures",
            self.name,
            summary.passes,
            summary.failures
        );
        Ok(summary)
    }

    fn build_drivers(&self) -> Result<Vec<Arc<ScheduleDriver>>, ScheduleError> {
        let mut drivers = Vec::new();
        for kind in [EventKind::Bar, EventKind::Timer] {
            for callback in self.registry.callbacks(kind) {
                let driver =
                    ScheduleDriver::from_callback(kind, callback.clone(), self.config.align_bars)?
                        .with_clock(Arc::clone(&self.clock));
                drivers.push(Arc::new(driver));
            }
        }
        log::debug!("[{}] Built {} schedule drivers", self.name, drivers.len());
        Ok(drivers)
    }

    fn spawn_ingestion(
        &mut self,
        descriptor: &ConnectionDescriptor,
        sink: EventSink,
        stop: StopSignal,
    ) -> Result<(), OrchestratorError> {
        let Some(mut connector) = self.connector.take() else {
            log::debug!("[{}] No market connector, streaming kinds stay idle", self.name);
            return Ok(());
        };

        let name = self.name.clone();
        let descriptor = descriptor.clone();
        let handle = thread::Builder::new()
            .name(self.config.ingestion_thread_name.clone())
            .spawn(move || {
                log::debug!("[{}] {} connecting to {}", name, connector.name(), descriptor.url);
                if let Err(e) = connector.connect(&descriptor, sink, stop) {
                    log::error!("[{}] {} stopped: {}", name, connector.name(), e);
                }
            })
            .map_err(|source| OrchestratorError::Spawn {
                thread: self.config.ingestion_thread_name.clone(),
                source,
            })?;
        self.ingestion = Some(handle);
        Ok(())
    }

    fn spawn_scheduler(
        &mut self,
        runner: AsyncTaskRunner,
        events: mpsc::Receiver<StreamEvent>,
        stop: StopSignal,
    ) -> Result<(), OrchestratorError> {
        let name = self.name.clone();
        let drivers = self.drivers.clone();
        let handle = thread::Builder::new()
            .name(self.config.scheduler_thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("[{}] Scheduling runtime failed to start: {}", name, e);
                        return;
                    }
                };
                runtime.block_on(runner.gather_all(&drivers, events, stop));
            })
            .map_err(|source| OrchestratorError::Spawn {
                thread: self.config.scheduler_thread_name.clone(),
                source,
            })?;
        self.scheduler = Some(handle);
        Ok(())
    }

    fn transition(&self, next: ProcessState) {
        match self.state.advance(next) {
            Ok(previous) => log::info!(
                "[{}] {} -> {} (run {})",
                self.name,
                previous,
                next,
                self.run_id.map(|id| id.to_string()).unwrap_or_default()
            ),
            Err(current) => log::warn!(
                "[{}] Ignored transition to {} from {}",
                self.name,
                next,
                current
            ),
        }
    }
}

impl Drop for ProcessOrchestrator {
    fn drop(&mut self) {
        if self.init_attempted && !self.shut_down {
            self.shutdown("dropped");
        }
    }
}
