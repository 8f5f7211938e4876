use std::cmp::Ordering;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Data / clock resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Clock grid step. Tick data is sampled on a one-second grid.
    pub fn step(&self) -> Duration {
        match self {
            Resolution::Tick | Resolution::Second => Duration::seconds(1),
            Resolution::Minute => Duration::minutes(1),
            Resolution::Hour => Duration::hours(1),
            Resolution::Daily => Duration::days(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tick" => Some(Resolution::Tick),
            "second" | "1s" => Some(Resolution::Second),
            "minute" | "1m" => Some(Resolution::Minute),
            "hour" | "1h" => Some(Resolution::Hour),
            "daily" | "day" | "1d" => Some(Resolution::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether prices are delivered as traded or scaled by the adjustment factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataNormalizationMode {
    #[default]
    Raw,
    Adjusted,
}

/// A point in simulated (exchange-local) time, tagged with the resolution of
/// the clock that produced it.
///
/// Equality and ordering consider the wall-clock value only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Instant {
    time: NaiveDateTime,
    resolution: Resolution,
}

impl Instant {
    pub fn new(time: NaiveDateTime, resolution: Resolution) -> Self {
        Self { time, resolution }
    }

    /// Midnight of `date`.
    pub fn start_of(date: NaiveDate, resolution: Resolution) -> Self {
        Self::new(date.and_time(NaiveTime::MIN), resolution)
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%Y-%m-%d %H:%M:%S"))
    }
}
