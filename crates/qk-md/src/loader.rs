//! Price CSV loader (deterministic).
//!
//! CSV format
//!
//! Required columns:
//! - `symbol` (ticker or OCC option identifier)
//! - `time` (exchange-local `YYYY-MM-DD HH:MM:SS[.fff]`, `T` separator or
//!   a bare date accepted) **or** `ts_utc` (epoch seconds, converted to
//!   America/New_York)
//! - `price` (decimal string)
//!
//! Optional columns:
//! - `open` (decimal string; session opening print of the bar)
//! - `factor` (decimal adjustment factor; default 1)

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::America::New_York;
use qk_schemas::{parse_price_micros, Symbol};
use serde::Deserialize;
use tracing::debug;

use crate::types::PricePoint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    EmptyInput,
    MissingHeader(&'static str),
    ParsePrice { column: &'static str, value: String },
    ParseTime { value: String },
    BadRow { line: usize, reason: String },
    Csv(String),
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e.to_string())
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::MissingHeader(h) => write!(f, "missing header: {}", h),
            LoadError::ParsePrice { column, value } => {
                write!(f, "failed to parse price in column {}: {}", column, value)
            }
            LoadError::ParseTime { value } => write!(f, "failed to parse time: {}", value),
            LoadError::BadRow { line, reason } => write!(f, "bad row at line {}: {}", line, reason),
            LoadError::Csv(e) => write!(f, "csv error: {}", e),
            LoadError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Deserialize)]
struct CsvRow {
    symbol: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    ts_utc: Option<i64>,
    price: String,
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    factor: Option<String>,
}

pub fn load_csv_file(path: impl AsRef<Path>) -> Result<Vec<PricePoint>, LoadError> {
    let s = fs::read_to_string(path)?;
    parse_csv_points(&s)
}

/// Parse price points from CSV content. Output is sorted by (time, symbol).
pub fn parse_csv_points(content: &str) -> Result<Vec<PricePoint>, LoadError> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(LoadError::EmptyInput);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);
    for required in ["symbol", "price"] {
        if !has(required) {
            return Err(LoadError::MissingHeader(required));
        }
    }
    if !has("time") && !has("ts_utc") {
        return Err(LoadError::MissingHeader("time"));
    }

    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
        let line = i + 2;
        let row = rec.map_err(|e| LoadError::BadRow {
            line,
            reason: e.to_string(),
        })?;
        out.push(row_to_point(row, line)?);
    }

    out.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.symbol.cmp(&b.symbol)));
    debug!(points = out.len(), "parsed price csv");
    Ok(out)
}

fn row_to_point(row: CsvRow, line: usize) -> Result<PricePoint, LoadError> {
    let symbol = Symbol::parse(&row.symbol).map_err(|e| LoadError::BadRow {
        line,
        reason: e.to_string(),
    })?;

    let time = match (row.time.as_deref().filter(|s| !s.is_empty()), row.ts_utc) {
        (Some(t), _) => parse_local_time(t)?,
        (None, Some(ts)) => utc_epoch_to_exchange(ts)?,
        (None, None) => {
            return Err(LoadError::BadRow {
                line,
                reason: "row has neither time nor ts_utc".to_string(),
            })
        }
    };

    let mut point = PricePoint::new(symbol, time, parse_decimal(&row.price, "price")?);
    if let Some(open) = row.open.as_deref().filter(|s| !s.is_empty()) {
        point = point.with_open(parse_decimal(open, "open")?);
    }
    if let Some(factor) = row.factor.as_deref().filter(|s| !s.is_empty()) {
        point = point.with_factor(parse_decimal(factor, "factor")?);
    }
    Ok(point)
}

fn parse_decimal(s: &str, column: &'static str) -> Result<i64, LoadError> {
    parse_price_micros(s).ok_or_else(|| LoadError::ParsePrice {
        column,
        value: s.to_string(),
    })
}

fn parse_local_time(s: &str) -> Result<NaiveDateTime, LoadError> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for f in FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, f) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| LoadError::ParseTime { value: s.to_string() })
}

fn utc_epoch_to_exchange(ts: i64) -> Result<NaiveDateTime, LoadError> {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(&New_York).naive_local())
        .ok_or_else(|| LoadError::ParseTime { value: ts.to_string() })
}
