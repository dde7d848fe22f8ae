mod payload;
mod stream;

pub use payload::{BacktestPass, BarClose, ErrorReport, EventPayload, TimerFire};
pub use stream::{
    AccountUpdate, BookLevel, BookUpdate, OrderUpdate, PositionUpdate, StreamEvent, Tick,
    Transaction,
};
