//! Stateful listener instances
//!
//! Besides plain callbacks, kinds that accept instances (bar, timer, book,
//! order, position, account, backtest) can have listener objects attached.
//! They receive the same payloads as the kind's callbacks.

use async_trait::async_trait;
use expert_core::EventPayload;
use expert_ports::CallbackResult;

#[async_trait]
pub trait EventListener: Send + Sync {
    /// Listener name for logging
    fn name(&self) -> &str;

    /// Called with every payload dispatched to the kind the listener is attached to
    async fn on_event(&self, payload: &EventPayload) -> CallbackResult;
}
