use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value carried in event payloads
pub type Price = Decimal;

/// Quantity value carried in event payloads
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Symbol identifier for a tradeable instrument (e.g. "BTCUSDT")
pub type Symbol = String;
