use crate::error::ConnectorError;
use expert_core::{ConnectionDescriptor, StreamEvent};
use tokio::sync::{mpsc, watch};

/// Handle through which the connectivity collaborator pushes parsed events
///
/// Cloneable and usable from plain threads: [`EventSink::send`] blocks while
/// the dispatch queue is full.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Push an event from a non-async thread
    ///
    /// Must not be called from inside a tokio runtime; use
    /// [`EventSink::send_async`] there.
    pub fn send(&self, event: StreamEvent) -> Result<(), ConnectorError> {
        self.tx
            .blocking_send(event)
            .map_err(|_| ConnectorError::SinkClosed)
    }

    /// Push an event from async code
    pub async fn send_async(&self, event: StreamEvent) -> Result<(), ConnectorError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ConnectorError::SinkClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Cooperative stop flag shared by drivers, dispatch loops and connectors
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Create a signal with its controlling sender (initially not stopped)
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once stop has been requested (or the sender is gone)
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Port for the market connectivity collaborator
///
/// `connect` runs on its own native thread and blocks for the life of the
/// connection. Reconnection policy and wire parsing are the implementor's
/// concern; it only needs to push parsed events into `sink` and return
/// once `stop` is raised.
pub trait MarketConnector: Send + 'static {
    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        sink: EventSink,
        stop: StopSignal,
    ) -> Result<(), ConnectorError>;

    /// Connector name for logging
    fn name(&self) -> &str {
        "MarketConnector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sink_send_from_plain_thread() {
        let (sink, mut rx) = EventSink::channel(4);
        let handle = std::thread::spawn(move || {
            sink.send(StreamEvent::tick("BTCUSDT", dec!(1), dec!(1), Utc::now()))
        });
        assert!(handle.join().unwrap().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_sink_closed_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel(4);
        drop(rx);
        let result = sink.send(StreamEvent::tick("BTCUSDT", dec!(1), dec!(1), Utc::now()));
        assert!(matches!(result, Err(ConnectorError::SinkClosed)));
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiter() {
        let (tx, stop) = StopSignal::channel();
        assert!(!stop.is_stopped());

        let mut waiter = stop.clone();
        let handle = tokio::spawn(async move { waiter.stopped().await });
        tx.send_replace(true);
        handle.await.unwrap();
        assert!(stop.is_stopped());
    }
}
