//! Callback handler types
//!
//! SYNC kinds take a plain closure over a borrowed payload; ASYNC kinds take
//! a closure returning a boxed, `Send` future that owns its payload so it can
//! be spawned as a cooperative task.

use expert_core::{Concurrency, EventPayload};
use expert_ports::CallbackResult;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Signature of a SYNC-class handler
pub type SyncFn = dyn Fn(&EventPayload) -> CallbackResult + Send + Sync;

/// Signature of an ASYNC-class handler
pub type AsyncFn = dyn Fn(EventPayload) -> BoxFuture<'static, CallbackResult> + Send + Sync;

/// Identity of a registered callback (its exported name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(String);

impl CallbackId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CallbackId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A callable bound to an event kind
#[derive(Clone)]
pub enum Handler {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

impl Handler {
    /// Wrap a blocking handler
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&EventPayload) -> CallbackResult + Send + Sync + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    /// Wrap a cooperative handler
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        Handler::Async(Arc::new(
            move |payload: EventPayload| -> BoxFuture<'static, CallbackResult> {
                Box::pin(f(payload))
            },
        ))
    }

    pub fn concurrency(&self) -> Concurrency {
        match self {
            Handler::Sync(_) => Concurrency::Sync,
            Handler::Async(_) => Concurrency::Async,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Schedule attached to a Bar or Timer registration
///
/// Kept in raw form; drivers validate it when they are constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleSpec {
    /// Bar timeframe name, e.g. `"1h"`
    Bar(String),
    /// Timer interval in seconds
    Timer(f64),
}

/// A callback as stored in the registry
#[derive(Debug, Clone)]
pub struct RegisteredCallback {
    pub id: CallbackId,
    pub handler: Handler,
    pub schedule: Option<ScheduleSpec>,
}

impl RegisteredCallback {
    pub fn new(id: impl Into<CallbackId>, handler: Handler) -> Self {
        Self {
            id: id.into(),
            handler,
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleSpec) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expert_ports::CallbackError;

    #[test]
    fn test_handler_concurrency() {
        let sync = Handler::sync(|_| Ok(()));
        let asynchronous = Handler::async_fn(|_| async { Ok(()) });
        assert_eq!(sync.concurrency(), Concurrency::Sync);
        assert_eq!(asynchronous.concurrency(), Concurrency::Async);
    }

    #[tokio::test]
    async fn test_async_handler_owns_payload() {
        let handler = Handler::async_fn(|payload| async move {
            match payload {
                EventPayload::Init => Ok(()),
                other => Err(CallbackError::failed(format!("unexpected {other:?}"))),
            }
        });
        let Handler::Async(f) = handler else {
            panic!("expected async handler");
        };
        assert!(f(EventPayload::Init).await.is_ok());
        assert!(f(EventPayload::deinit("stop")).await.is_err());
    }

    #[test]
    fn test_callback_id_from_borrowed_and_owned_names() {
        let borrowed = CallbackId::from("on_tick");
        let owned = CallbackId::from(format!("on_{}", "tick"));
        assert_eq!(borrowed, owned);
        assert_eq!(owned.to_string(), "on_tick");
    }
}
