use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use qk_clock::CalendarSpec;
use qk_schemas::{DataNormalizationMode, Instant, Symbol};

use crate::source::PriceSource;
use crate::types::{DataSlice, PricePoint, Quote, SessionOpen};

#[derive(Clone, Debug, Default)]
struct Cursor {
    next: usize,
    last: Option<Quote>,
}

/// Per-step slicer over a [`PriceSource`].
///
/// Each symbol has its own cursor that only moves forward. A symbol that is
/// not requested for a while is caught up the next time it is requested.
pub struct MarketDataFeed {
    source: Arc<dyn PriceSource>,
    calendar: CalendarSpec,
    mode: DataNormalizationMode,
    cursors: BTreeMap<Symbol, Cursor>,
}

impl MarketDataFeed {
    pub fn new(source: Arc<dyn PriceSource>, calendar: CalendarSpec, mode: DataNormalizationMode) -> Self {
        Self {
            source,
            calendar,
            mode,
            cursors: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> DataNormalizationMode {
        self.mode
    }

    /// Latest quote per requested symbol as of `instant`. Symbols without
    /// any print at or before `instant` are omitted.
    pub fn slice<'a>(&mut self, instant: Instant, symbols: impl IntoIterator<Item = &'a Symbol>) -> DataSlice {
        let mut out = DataSlice::new(instant);
        for symbol in symbols {
            if let Some(q) = self.advance(symbol, instant) {
                out.insert(symbol.clone(), q);
            }
        }
        out
    }

    fn advance(&mut self, symbol: &Symbol, instant: Instant) -> Option<Quote> {
        let series = self.source.series(symbol)?;
        let cursor = self.cursors.entry(symbol.clone()).or_default();
        let now = instant.time();

        while let Some(p) = series.get(cursor.next) {
            if p.time > now {
                break;
            }
            let prev_open = cursor.last.and_then(|q| q.session_open);
            let date = p.time.date();
            let unseen = prev_open.map_or(true, |o| o.date != date);
            let session_open = match opening_time(&self.calendar, p) {
                Some(time) if unseen => Some(SessionOpen {
                    date,
                    time,
                    open_micros: p.open(self.mode),
                }),
                _ => prev_open,
            };
            cursor.last = Some(Quote {
                time: p.time,
                price_micros: p.price(self.mode),
                session_open,
            });
            cursor.next += 1;
        }
        cursor.last
    }
}

/// Session-open time `p` can stand for, if any.
///
/// A print inside the regular session opens it at its own time. A bar that
/// carries an `open` and is stamped at midnight or at/after the close (daily
/// bars) stands for the whole session of its date.
fn opening_time(calendar: &CalendarSpec, p: &PricePoint) -> Option<NaiveDateTime> {
    if calendar.is_market_open(p.time) {
        return Some(p.time);
    }
    if p.open_micros.is_none() {
        return None;
    }
    let date = p.time.date();
    let close = calendar.session_close(date)?;
    if p.time.time() == NaiveTime::MIN || p.time >= close {
        calendar.session_open(date)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryPriceSource;
    use chrono::NaiveDate;
    use qk_schemas::Resolution;

    fn t(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 10, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> Instant {
        Instant::new(t(day, h, m), Resolution::Minute)
    }

    fn feed() -> MarketDataFeed {
        let spy = Symbol::equity("SPY");
        let src = InMemoryPriceSource::from_points(vec![
            PricePoint::new(spy.clone(), t(7, 9, 30), 168_000_000),
            PricePoint::new(spy.clone(), t(7, 15, 0), 168_500_000),
            PricePoint::new(spy.clone(), t(8, 9, 31), 167_450_000),
            PricePoint::new(spy.clone(), t(8, 9, 45), 167_000_000),
        ]);
        MarketDataFeed::new(Arc::new(src), CalendarSpec::NyseWeekdays, DataNormalizationMode::Raw)
    }

    #[test]
    fn omits_symbols_without_data_yet() {
        let mut f = feed();
        let spy = Symbol::equity("SPY");
        let qqq = Symbol::equity("QQQ");
        let s = f.slice(at(7, 9, 0), [&spy, &qqq]);
        assert!(s.is_empty());
        let s = f.slice(at(7, 9, 30), [&spy, &qqq]);
        assert_eq!(s.price(&spy), Some(168_000_000));
        assert!(!s.contains(&qqq));
    }

    #[test]
    fn session_open_tracks_first_print_of_each_session() {
        let mut f = feed();
        let spy = Symbol::equity("SPY");
        let s = f.slice(at(7, 16, 0), [&spy]);
        let q = s.get(&spy).unwrap();
        assert_eq!(q.price_micros, 168_500_000);
        assert_eq!(q.session_open.unwrap().time, t(7, 9, 30));

        let s = f.slice(at(8, 10, 0), [&spy]);
        let q = s.get(&spy).unwrap();
        assert_eq!(q.price_micros, 167_000_000);
        let open = q.session_open.unwrap();
        assert_eq!(open.time, t(8, 9, 31));
        assert_eq!(open.open_micros, 167_450_000);
    }

    #[test]
    fn daily_bars_open_their_session() {
        let spy = Symbol::equity("SPY");
        let src = InMemoryPriceSource::from_points(vec![
            PricePoint::new(spy.clone(), t(7, 4, 0), 168_100_000).with_open(168_000_000),
            PricePoint::new(spy.clone(), t(7, 16, 0), 167_430_000).with_open(168_800_000),
            PricePoint::new(spy.clone(), t(8, 0, 0), 165_480_000).with_open(167_450_000),
        ]);
        let mut f = MarketDataFeed::new(Arc::new(src), CalendarSpec::NyseWeekdays, DataNormalizationMode::Raw);

        // Pre-market bar: not a session open.
        let s = f.slice(at(7, 5, 0), [&spy]);
        assert_eq!(s.get(&spy).unwrap().session_open, None);

        let s = f.slice(at(7, 16, 0), [&spy]);
        let open = s.get(&spy).unwrap().session_open.unwrap();
        assert_eq!(open.time, t(7, 9, 30));
        assert_eq!(open.open_micros, 168_800_000);

        let s = f.slice(at(8, 0, 0), [&spy]);
        let open = s.get(&spy).unwrap().session_open.unwrap();
        assert_eq!(open.date, NaiveDate::from_ymd_opt(2013, 10, 8).unwrap());
        assert_eq!(open.time, t(8, 9, 30));
        assert_eq!(open.open_micros, 167_450_000);
    }

    #[test]
    fn bar_without_open_stays_a_plain_print() {
        let spy = Symbol::equity("SPY");
        let src = InMemoryPriceSource::from_points(vec![PricePoint::new(spy.clone(), t(7, 16, 0), 167_430_000)]);
        let mut f = MarketDataFeed::new(Arc::new(src), CalendarSpec::NyseWeekdays, DataNormalizationMode::Raw);
        let s = f.slice(at(8, 0, 0), [&spy]);
        assert_eq!(s.get(&spy).unwrap().session_open, None);
    }

    #[test]
    fn cursor_never_moves_backward() {
        let mut f = feed();
        let spy = Symbol::equity("SPY");
        let _ = f.slice(at(8, 10, 0), [&spy]);
        let s = f.slice(at(7, 10, 0), [&spy]);
        assert_eq!(s.price(&spy), Some(167_000_000));
    }
}
