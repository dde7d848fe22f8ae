//! Expert Ports
//!
//! Port definitions (traits) for the expert dispatch engine.
//! These define the boundaries between the dispatch core and its
//! collaborators (time source, market connectivity) plus the error taxonomy
//! shared across crates.

mod clock;
mod connector;
mod error;

pub use clock::Clock;
pub use connector::{EventSink, MarketConnector, StopSignal};
pub use error::{CallbackError, CallbackResult, ConnectorError, ScheduleError, ScheduleResult};
