//! Expert Strategy API
//!
//! What a strategy author touches:
//! - Typed callback registration ([`StrategyBuilder`])
//! - Stateful listener instances ([`EventListener`])
//! - Callback discovery from a module's export table
//! - The per-kind event registry the runner dispatches from
//!
//! ## Flow
//!
//! ```text
//!  StrategyBuilder ──build()──► Strategy (export table)
//!                                   │
//!                                   ▼  CallbackDiscovery::discover
//!                             EventRegistry ──Arc──► runner (drivers, dispatch)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use expert_strategy::{CallbackDiscovery, EventRegistry, StrategyBuilder};
//!
//! let strategy = StrategyBuilder::new("sma_cross")
//!     .on_init("init", |_| Ok(()))
//!     .on_bar("hourly", "1h", |_| async { Ok(()) })
//!     .build();
//!
//! let mut registry = EventRegistry::new();
//! CallbackDiscovery::discover(&strategy, &mut registry);
//! ```

pub mod builder;
pub mod callback;
pub mod discovery;
pub mod listener;
pub mod module;
pub mod registry;

// Re-export main types
pub use builder::{Strategy, StrategyBuilder};
pub use callback::{AsyncFn, CallbackId, Handler, RegisteredCallback, ScheduleSpec, SyncFn};
pub use discovery::{CallbackDiscovery, DiscoveryReport};
pub use listener::EventListener;
pub use module::{Export, StrategyModule};
pub use registry::{EventRegistry, RegistryEntry};
