use thiserror::Error;

/// Invalid driver construction parameters (fatal, raised before scheduling)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Period must be positive, got {0}")]
    NonPositivePeriod(f64),

    #[error("Period must be a finite number, got {0}")]
    NonFinitePeriod(f64),

    #[error("Unknown timeframe: '{0}'")]
    UnknownTimeframe(String),

    #[error("Callback '{0}' has no schedule attached")]
    MissingSchedule(String),
}

/// A strategy callback failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("{0}")]
    Failed(String),

    #[error("Callback panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    pub fn failed(message: impl Into<String>) -> Self {
        CallbackError::Failed(message.into())
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError::Failed(message)
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError::Failed(message.to_string())
    }
}

/// Market connectivity failures
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Event sink closed")]
    SinkClosed,
}

pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;
pub type CallbackResult = std::result::Result<(), CallbackError>;
