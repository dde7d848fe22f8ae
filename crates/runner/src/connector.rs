//! Replay connector
//!
//! A [`MarketConnector`] that pushes a fixed list of events instead of
//! talking to an exchange. Used by the demo binary and by tests that need
//! streaming dispatch without a network.

use expert_core::{ConnectionDescriptor, StreamEvent};
use expert_ports::{ConnectorError, EventSink, MarketConnector, StopSignal};
use std::time::Duration;

pub struct ReplayConnector {
    events: Vec<StreamEvent>,
    pacing: Duration,
    hold_open: bool,
}

impl ReplayConnector {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            pacing: Duration::ZERO,
            hold_open: false,
        }
    }

    /// Parse a JSON array of tagged events
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Pause between two events
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Keep the connection open after the last event until stop is raised
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    fn wanted(descriptor: &ConnectionDescriptor, event: &StreamEvent) -> bool {
        match event.symbol() {
            Some(symbol) if !descriptor.symbols.is_empty() => {
                descriptor.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
            }
            _ => true,
        }
    }
}

impl MarketConnector for ReplayConnector {
    fn connect(
        &mut self,
        descriptor: &ConnectionDescriptor,
        sink: EventSink,
        stop: StopSignal,
    ) -> Result<(), ConnectorError> {
        log::info!(
            "[{}] Replaying {} events for {}",
            self.name(),
            self.events.len(),
            descriptor.exchange
        );

        let mut sent = 0usize;
        for event in self.events.drain(..) {
            if stop.is_stopped() {
                break;
            }
            if !Self::wanted(descriptor, &event) {
                continue;
            }
            sink.send(event)?;
            sent += 1;
            if !self.pacing.is_zero() {
                std::thread::sleep(self.pacing);
            }
        }
        log::debug!("[{}] Sent {} events", self.name(), sent);

        while self.hold_open && !stop.is_stopped() {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ReplayConnector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_replay_filters_by_symbol() {
        let now = Utc::now();
        let mut connector = ReplayConnector::new(vec![
            StreamEvent::tick("BTCUSDT", dec!(50000), dec!(1), now),
            StreamEvent::tick("ETHUSDT", dec!(3000), dec!(1), now),
        ]);
        let descriptor = ConnectionDescriptor::new("replay", "memory://").with_symbol("btcusdt");
        let (sink, mut rx) = EventSink::channel(8);
        let (_tx, stop) = StopSignal::channel();

        connector.connect(&descriptor, sink, stop).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.symbol(), Some("BTCUSDT"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replay_stops_on_closed_sink() {
        let now = Utc::now();
        let mut connector =
            ReplayConnector::new(vec![StreamEvent::tick("BTCUSDT", dec!(1), dec!(1), now)]);
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        let (_tx, stop) = StopSignal::channel();

        let result = connector.connect(&ConnectionDescriptor::default(), sink, stop);
        assert!(matches!(result, Err(ConnectorError::SinkClosed)));
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"type":"tick","symbol":"BTCUSDT","price":"50000","quantity":"0.1","time":"2024-03-05T14:00:00Z"},
            {"type":"account","asset":"USDT","free":"1000","locked":"0","time":"2024-03-05T14:00:01Z"}
        ]"#;
        let connector = ReplayConnector::from_json(json).unwrap();
        assert_eq!(connector.events.len(), 2);
    }
}
