//! Payloads handed to strategy callbacks

use super::stream::StreamEvent;
use crate::kind::EventKind;
use crate::timeframe::Timeframe;
use crate::values::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A bar driver reached a bar boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarClose {
    pub timeframe: Timeframe,
    /// Scheduled close time of the bar that just ended
    pub closed_at: Timestamp,
}

/// A timer driver completed one interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerFire {
    pub interval: Duration,
    pub fired_at: Timestamp,
    /// Total time accumulated by the driver, this interval included
    pub elapsed: Duration,
}

/// A callback failed; forwarded to `on_error` handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: EventKind,
    pub callback: String,
    pub message: String,
}

/// One backtest pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestPass {
    pub pass: u32,
    pub total: u32,
}

/// Argument passed to every strategy callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Init,
    Deinit { reason: String },
    Stream(StreamEvent),
    Bar(BarClose),
    Timer(TimerFire),
    Error(ErrorReport),
    Backtest(BacktestPass),
}

impl EventPayload {
    pub fn deinit(reason: impl Into<String>) -> Self {
        EventPayload::Deinit {
            reason: reason.into(),
        }
    }

    pub fn as_stream(&self) -> Option<&StreamEvent> {
        match self {
            EventPayload::Stream(event) => Some(event),
            _ => None,
        }
    }
}

impl From<StreamEvent> for EventPayload {
    fn from(event: StreamEvent) -> Self {
        EventPayload::Stream(event)
    }
}
