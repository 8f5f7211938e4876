//! CSV fixture -> in-memory source -> feed, the path the CLI takes.

use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use qk_clock::CalendarSpec;
use qk_md::*;
use qk_schemas::{DataNormalizationMode, Instant, Resolution, Symbol};

const SPY_TICKS: &str = include_str!("fixtures/spy_moo_ticks.csv");

fn at(day: u32, h: u32, m: u32, s: u32) -> Instant {
    let t = NaiveDate::from_ymd_opt(2013, 10, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap();
    Instant::new(t, Resolution::Second)
}

#[test]
fn fixture_parses_and_slices_session_opens() {
    let points = parse_csv_points(SPY_TICKS).unwrap();
    assert_eq!(points.len(), 12);

    let src = Arc::new(InMemoryPriceSource::from_points(points));
    let mut feed = MarketDataFeed::new(src, CalendarSpec::NyseWeekdays, DataNormalizationMode::Raw);
    let spy = Symbol::equity("SPY");

    let s = feed.slice(at(7, 15, 0, 0), [&spy]);
    assert_eq!(s.price(&spy), Some(167_600_000));

    let s = feed.slice(at(8, 9, 30, 0), [&spy]);
    let open = s.get(&spy).unwrap().session_open.unwrap();
    assert_eq!(open.open_micros, 167_450_000);

    let s = feed.slice(at(9, 9, 30, 0), [&spy]);
    let open = s.get(&spy).unwrap().session_open.unwrap();
    assert_eq!(open.open_micros, 165_820_000);
    assert_eq!(open.date, NaiveDate::from_ymd_opt(2013, 10, 9).unwrap());
}

#[test]
fn load_from_disk_matches_in_memory_parse() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(SPY_TICKS.as_bytes()).unwrap();
    let from_disk = load_csv_file(f.path()).unwrap();
    assert_eq!(from_disk, parse_csv_points(SPY_TICKS).unwrap());
}

#[test]
fn missing_file_is_io_error() {
    let err = load_csv_file("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, LoadError::Io(_)));
}
