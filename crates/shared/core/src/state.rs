//! Process lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Orchestrator lifecycle, strictly monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProcessState {
    Created = 0,
    Initialized = 1,
    Running = 2,
    Shutdown = 3,
}

impl ProcessState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessState::Created,
            1 => ProcessState::Initialized,
            2 => ProcessState::Running,
            _ => ProcessState::Shutdown,
        }
    }

    /// Streaming callbacks may only fire in these states
    pub fn accepts_events(self) -> bool {
        matches!(self, ProcessState::Initialized | ProcessState::Running)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Created => "CREATED",
            ProcessState::Initialized => "INITIALIZED",
            ProcessState::Running => "RUNNING",
            ProcessState::Shutdown => "SHUTDOWN",
        };
        f.write_str(s)
    }
}

/// Shareable cell holding a [`ProcessState`]
///
/// Only forward transitions succeed, so readers on other threads never
/// observe the state moving backwards.
#[derive(Debug)]
pub struct ProcessStateCell(AtomicU8);

impl ProcessStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ProcessState::Created as u8))
    }

    pub fn get(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state.
    ///
    /// Returns the previous state on success, or the current state if the
    /// transition would go backwards or stay in place.
    pub fn advance(&self, next: ProcessState) -> Result<ProcessState, ProcessState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next as u8 > current).then_some(next as u8)
            })
            .map(ProcessState::from_u8)
            .map_err(ProcessState::from_u8)
    }
}

impl Default for ProcessStateCell {
    fn default() -> Self {
        Self::new()
    }
}
