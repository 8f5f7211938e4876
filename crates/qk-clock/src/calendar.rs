//! Trading session calendar.
//!
//! # Variants
//!
//! - [`CalendarSpec::AlwaysOn`]: every date trades; the session spans the
//!   whole day starting at midnight.
//! - [`CalendarSpec::NyseWeekdays`]: NYSE-style equities. Weekdays 09:30-16:00
//!   exchange time, excluding US market holidays computed from their rules.
//!
//! All times are exchange-local `NaiveDateTime`s, the same frame the clock
//! runs in.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CalendarSpec
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarSpec {
    /// 24/7. Useful for synthetic data and tests that do not need sessions.
    AlwaysOn,
    /// Weekdays 09:30-16:00, US market holidays excluded.
    #[default]
    NyseWeekdays,
}

const NYSE_OPEN: (u32, u32) = (9, 30);
const NYSE_CLOSE: (u32, u32) = (16, 0);

// Holiday gaps never exceed a long weekend plus a holiday; this bounds the
// forward search in `next_trading_day`.
const MAX_CLOSED_RUN: u32 = 10;

impl CalendarSpec {
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        match self {
            CalendarSpec::AlwaysOn => true,
            CalendarSpec::NyseWeekdays => {
                !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_us_market_holiday(date)
            }
        }
    }

    /// Regular session open on `date`, or `None` when the market is closed.
    pub fn session_open(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        if !self.is_trading_day(date) {
            return None;
        }
        Some(match self {
            CalendarSpec::AlwaysOn => date.and_time(NaiveTime::MIN),
            CalendarSpec::NyseWeekdays => date.and_time(hm(NYSE_OPEN)),
        })
    }

    /// Regular session close on `date` (exclusive end), or `None` when closed.
    pub fn session_close(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        if !self.is_trading_day(date) {
            return None;
        }
        match self {
            CalendarSpec::AlwaysOn => date.and_time(NaiveTime::MIN).checked_add_signed(Duration::days(1)),
            CalendarSpec::NyseWeekdays => Some(date.and_time(hm(NYSE_CLOSE))),
        }
    }

    /// First trading day strictly after `after`.
    pub fn next_trading_day(&self, after: NaiveDate) -> Option<NaiveDate> {
        let mut d = after;
        for _ in 0..MAX_CLOSED_RUN {
            d = d.succ_opt()?;
            if self.is_trading_day(d) {
                return Some(d);
            }
        }
        None
    }

    /// Session open of the first trading day strictly after `date`.
    pub fn next_session_open_after(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        self.next_trading_day(date).and_then(|d| self.session_open(d))
    }

    /// `true` when `time` falls inside a regular session: `open <= time < close`.
    pub fn is_market_open(&self, time: NaiveDateTime) -> bool {
        let date = time.date();
        match (self.session_open(date), self.session_close(date)) {
            (Some(open), Some(close)) => time >= open && time < close,
            _ => false,
        }
    }
}

fn hm((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

// ---------------------------------------------------------------------------
// US market holidays (rule based)
// ---------------------------------------------------------------------------

/// `true` if `date` is a full-day US equity market holiday (observed date).
pub fn is_us_market_holiday(date: NaiveDate) -> bool {
    let y = date.year();
    let fixed = |m: u32, d: u32| NaiveDate::from_ymd_opt(y, m, d).map(observed);

    let mut days: Vec<Option<NaiveDate>> = vec![
        new_years_observed(y),
        NaiveDate::from_weekday_of_month_opt(y, 1, Weekday::Mon, 3),
        NaiveDate::from_weekday_of_month_opt(y, 2, Weekday::Mon, 3),
        easter_sunday(y).and_then(|e| e.checked_sub_signed(Duration::days(2))),
        last_weekday_of_month(y, 5, Weekday::Mon),
        fixed(7, 4),
        NaiveDate::from_weekday_of_month_opt(y, 9, Weekday::Mon, 1),
        NaiveDate::from_weekday_of_month_opt(y, 11, Weekday::Thu, 4),
        fixed(12, 25),
    ];
    if y >= 2022 {
        days.push(fixed(6, 19));
    }
    // New Year's Day of next year falling on Saturday is not moved into
    // this year's December 31.
    days.into_iter().flatten().any(|h| h == date)
}

fn new_years_observed(y: i32) -> Option<NaiveDate> {
    let d = NaiveDate::from_ymd_opt(y, 1, 1)?;
    match d.weekday() {
        Weekday::Sat => None,
        Weekday::Sun => d.succ_opt(),
        _ => Some(d),
    }
}

/// Saturday holidays are observed Friday, Sunday holidays Monday.
fn observed(d: NaiveDate) -> NaiveDate {
    match d.weekday() {
        Weekday::Sat => d.pred_opt().unwrap_or(d),
        Weekday::Sun => d.succ_opt().unwrap_or(d),
        _ => d,
    }
}

fn last_weekday_of_month(y: i32, m: u32, wd: Weekday) -> Option<NaiveDate> {
    let first_next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)?
    };
    let mut d = first_next.pred_opt()?;
    while d.weekday() != wd {
        d = d.pred_opt()?;
    }
    Some(d)
}

/// Gregorian Easter Sunday (anonymous algorithm).
fn easter_sunday(y: i32) -> Option<NaiveDate> {
    let a = y % 19;
    let b = y / 100;
    let c = y % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(y, month as u32, day as u32)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn holiday_rules_match_published_dates() {
        // 2024 and 2026 published NYSE schedules.
        for h in [
            d(2024, 1, 1),
            d(2024, 1, 15),
            d(2024, 2, 19),
            d(2024, 3, 29),
            d(2024, 5, 27),
            d(2024, 6, 19),
            d(2024, 7, 4),
            d(2024, 9, 2),
            d(2024, 11, 28),
            d(2024, 12, 25),
            d(2026, 4, 3),
            d(2026, 7, 3),
        ] {
            assert!(is_us_market_holiday(h), "{h} should be a holiday");
        }
        assert!(!is_us_market_holiday(d(2024, 1, 8)));
    }

    #[test]
    fn juneteenth_only_from_2022() {
        assert!(!is_us_market_holiday(d(2014, 6, 19)));
        assert!(is_us_market_holiday(d(2023, 6, 19)));
    }

    #[test]
    fn saturday_new_year_is_not_observed() {
        // 2022-01-01 was a Saturday; 2021-12-31 traded.
        assert!(CalendarSpec::NyseWeekdays.is_trading_day(d(2021, 12, 31)));
        // 2023-01-01 was a Sunday; observed Monday.
        assert!(!CalendarSpec::NyseWeekdays.is_trading_day(d(2023, 1, 2)));
    }

    #[test]
    fn next_session_skips_weekend_and_holiday() {
        let cal = CalendarSpec::NyseWeekdays;
        // Thu 2024-03-28 -> Good Friday -> weekend -> Mon 2024-04-01.
        assert_eq!(cal.next_trading_day(d(2024, 3, 28)), Some(d(2024, 4, 1)));
        assert_eq!(
            cal.next_session_open_after(d(2013, 10, 7)),
            Some(d(2013, 10, 8).and_hms_opt(9, 30, 0).unwrap())
        );
    }

    #[test]
    fn market_open_window_is_half_open() {
        let cal = CalendarSpec::NyseWeekdays;
        let day = d(2013, 10, 8);
        assert!(!cal.is_market_open(day.and_hms_opt(9, 29, 59).unwrap()));
        assert!(cal.is_market_open(day.and_hms_opt(9, 30, 0).unwrap()));
        assert!(!cal.is_market_open(day.and_hms_opt(16, 0, 0).unwrap()));
        assert!(CalendarSpec::AlwaysOn.is_market_open(day.and_hms_opt(3, 0, 0).unwrap()));
    }
}
