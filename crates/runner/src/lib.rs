//! Expert Runner - event dispatch and scheduling engine
//!
//! Runs a strategy built with `expert-strategy`:
//!
//! - **Schedule drivers**: one independent loop per Bar/Timer callback
//! - **Async task runner**: executes a kind's callbacks, isolating failures
//! - **Orchestrator**: INIT, thread spawning, shutdown and DEINIT
//!
//! ## Architecture
//!
//! ```text
//!   caller thread            ingestion thread          scheduling thread
//!  ┌──────────────┐        ┌──────────────────┐      ┌──────────────────────┐
//!  │ INIT / DEINIT│        │ MarketConnector  │      │ current-thread tokio │
//!  │ (sync kinds) │        │   .connect()     │      │                      │
//!  └──────┬───────┘        └────────┬─────────┘      │  gather_all:         │
//!         │ spawn                   │ EventSink      │   ├ Bar drivers      │
//!         └──────────────────────►  └──── mpsc ─────►│   ├ Timer drivers    │
//!                                                    │   └ stream dispatch  │
//!                                                    │     (lane per kind)  │
//!                                                    └──────────────────────┘
//! ```

pub mod config;
pub mod connector;
pub mod orchestrator;
pub mod scheduler;
pub mod signals;
pub mod task_runner;

// Re-export main types
pub use config::{ConfigError, RunnerConfig, load_config, load_config_from_str, load_default_config};
pub use connector::ReplayConnector;
pub use orchestrator::{BacktestSummary, OrchestratorError, ProcessOrchestrator};
pub use scheduler::{DriverError, DriverState, Schedule, ScheduleDriver};
pub use signals::wait_for_shutdown_signal;
pub use task_runner::{AsyncTaskRunner, CallbackFailure, RunReport};
