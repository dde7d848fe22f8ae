//! Streaming events delivered by the market connectivity collaborator
//!
//! Payloads arrive already parsed; wire formats belong to the connector.

use crate::entities::{OrderStatus, Side};
use crate::kind::EventKind;
use crate::values::{Price, Quantity, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// Last trade / best price update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub time: Timestamp,
}

/// One price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// Order book depth update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub symbol: Symbol,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub time: Timestamp,
}

/// Own order status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub symbol: Symbol,
    pub order_id: String,
    pub side: Side,
    pub status: OrderStatus,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub time: Timestamp,
}

/// Position change for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub symbol: Symbol,
    /// Signed size, positive long and negative short
    pub quantity: Quantity,
    pub entry_price: Price,
    pub unrealized_pnl: Price,
    pub time: Timestamp,
}

/// Balance change for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub asset: String,
    pub free: Quantity,
    pub locked: Quantity,
    pub time: Timestamp,
}

/// Own execution (fill) report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub symbol: Symbol,
    pub order_id: String,
    pub trade_id: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub commission: Price,
    pub time: Timestamp,
}

/// Any event pushed by the connectivity collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Tick(Tick),
    Book(BookUpdate),
    Order(OrderUpdate),
    Position(PositionUpdate),
    Account(AccountUpdate),
    Transaction(Transaction),
}

impl StreamEvent {
    /// Event kind whose callbacks receive this event
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Tick(_) => EventKind::Tick,
            StreamEvent::Book(_) => EventKind::Book,
            StreamEvent::Order(_) => EventKind::Order,
            StreamEvent::Position(_) => EventKind::Position,
            StreamEvent::Account(_) => EventKind::Account,
            StreamEvent::Transaction(_) => EventKind::Transaction,
        }
    }

    /// Instrument the event relates to (account updates carry an asset instead)
    pub fn symbol(&self) -> Option<&str> {
        match self {
            StreamEvent::Tick(e) => Some(&e.symbol),
            StreamEvent::Book(e) => Some(&e.symbol),
            StreamEvent::Order(e) => Some(&e.symbol),
            StreamEvent::Position(e) => Some(&e.symbol),
            StreamEvent::Transaction(e) => Some(&e.symbol),
            StreamEvent::Account(_) => None,
        }
    }

    pub fn time(&self) -> Timestamp {
        match self {
            StreamEvent::Tick(e) => e.time,
            StreamEvent::Book(e) => e.time,
            StreamEvent::Order(e) => e.time,
            StreamEvent::Position(e) => e.time,
            StreamEvent::Account(e) => e.time,
            StreamEvent::Transaction(e) => e.time,
        }
    }

    /// Create a tick event
    pub fn tick(symbol: impl Into<Symbol>, price: Price, quantity: Quantity, time: Timestamp) -> Self {
        StreamEvent::Tick(Tick {
            symbol: symbol.into(),
            price,
            quantity,
            time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stream_event_kinds() {
        let tick = StreamEvent::tick("BTCUSDT", dec!(50000), dec!(0.01), Utc::now());
        assert_eq!(tick.kind(), EventKind::Tick);
        assert_eq!(tick.symbol(), Some("BTCUSDT"));

        let account = StreamEvent::Account(AccountUpdate {
            asset: "USDT".to_string(),
            free: dec!(1000),
            locked: dec!(0),
            time: Utc::now(),
        });
        assert_eq!(account.kind(), EventKind::Account);
        assert_eq!(account.symbol(), None);
    }

    #[test]
    fn test_every_stream_kind_is_streaming() {
        let now = Utc::now();
        let events = [
            StreamEvent::tick("ETHUSDT", dec!(3000), dec!(1), now),
            StreamEvent::Book(BookUpdate {
                symbol: "ETHUSDT".to_string(),
                bids: vec![BookLevel { price: dec!(2999), quantity: dec!(2) }],
                asks: vec![],
                time: now,
            }),
        ];
        for event in &events {
            assert!(event.kind().is_streaming());
        }
    }

    #[test]
    fn test_tagged_json() {
        let json = r#"{"type":"tick","symbol":"BTCUSDT","price":"50000","quantity":"0.5","time":"2024-03-05T14:00:00Z"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::Tick(tick) => assert_eq!(tick.price, dec!(50000)),
            other => panic!("Wrong event type: {other:?}"),
        }
    }
}
