//! Expert Core Domain
//!
//! Pure domain types for the expert event dispatch engine: the event kind
//! catalog, bar timeframes, lifecycle state and the payloads handed to
//! strategy callbacks.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod connection;
pub mod entities;
pub mod events;
pub mod kind;
pub mod state;
pub mod timeframe;
pub mod values;

// Re-export commonly used types at crate root
pub use connection::ConnectionDescriptor;
pub use entities::{OrderStatus, Side};
pub use events::{
    AccountUpdate, BacktestPass, BarClose, BookLevel, BookUpdate, ErrorReport, EventPayload,
    OrderUpdate, PositionUpdate, StreamEvent, Tick, TimerFire, Transaction,
};
pub use kind::{Concurrency, EventKind, EventKindSpec};
pub use state::{ProcessState, ProcessStateCell};
pub use timeframe::Timeframe;
pub use values::{Price, Quantity, Symbol, Timestamp};
