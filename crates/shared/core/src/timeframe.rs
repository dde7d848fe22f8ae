//! Bar timeframes and wall-clock alignment

use crate::values::Timestamp;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported bar timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
        }
    }

    /// Length of one bar in seconds
    pub const fn seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M3 => 180,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H2 => 7_200,
            Timeframe::H4 => 14_400,
            Timeframe::H6 => 21_600,
            Timeframe::H8 => 28_800,
            Timeframe::H12 => 43_200,
            Timeframe::D1 => 86_400,
            Timeframe::D3 => 259_200,
            Timeframe::W1 => 604_800,
        }
    }

    pub fn duration(self) -> std::time::Duration {
        std::time::Duration::from_secs(self.seconds() as u64)
    }

    /// Parse a timeframe name such as `"1h"` (case-insensitive)
    pub fn parse(name: &str) -> Option<Timeframe> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tf| tf.name().eq_ignore_ascii_case(name))
    }

    /// Start of the next bar strictly after `now`
    ///
    /// Weekly bars open on Monday 00:00 UTC; every other timeframe is
    /// aligned to a multiple of its length since the Unix epoch.
    pub fn next_aligned(self, now: Timestamp) -> Timestamp {
        match self {
            Timeframe::W1 => next_monday(now),
            _ => {
                let period = self.seconds();
                let start = now.timestamp().div_euclid(period) * period;
                Utc.timestamp_opt(start + period, 0)
                    .single()
                    .unwrap_or(now + Duration::seconds(period))
            }
        }
    }
}

fn next_monday(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = 7 - i64::from(now.weekday().num_days_from_monday());
    let date = now.date_naive() + Duration::days(days_ahead);
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now + Duration::days(days_ahead))
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
