//! Declarative schedules: "which dates" x "what time on those dates".
//!
//! A schedule fires at most once per computed fire time, never before the
//! instant it was registered, at the first step at or after the fire time.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use qk_clock::CalendarSpec;

use crate::context::StrategyContext;
use crate::types::{Strategy, StrategyResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateRule {
    EveryDay,
    EveryTradingDay,
    On(NaiveDate),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeRule {
    Midnight,
    At(u32, u32),
    /// Minutes after the session open.
    AfterMarketOpen(i64),
    /// Minutes before the session close.
    BeforeMarketClose(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleRule {
    pub date: DateRule,
    pub time: TimeRule,
}

impl ScheduleRule {
    pub fn new(date: DateRule, time: TimeRule) -> Self {
        Self { date, time }
    }

    pub fn every_day_at(hour: u32, minute: u32) -> Self {
        Self::new(DateRule::EveryDay, TimeRule::At(hour, minute))
    }

    /// Fire time on `date`, or `None` when the rule does not fire that day.
    pub fn fire_time(&self, date: NaiveDate, calendar: &CalendarSpec) -> Option<NaiveDateTime> {
        let date_ok = match self.date {
            DateRule::EveryDay => true,
            DateRule::EveryTradingDay => calendar.is_trading_day(date),
            DateRule::On(d) => d == date,
        };
        if !date_ok {
            return None;
        }
        match self.time {
            TimeRule::Midnight => Some(date.and_time(NaiveTime::MIN)),
            TimeRule::At(h, m) => NaiveTime::from_hms_opt(h, m, 0).map(|t| date.and_time(t)),
            TimeRule::AfterMarketOpen(min) => calendar
                .session_open(date)
                .and_then(|o| o.checked_add_signed(Duration::minutes(min))),
            TimeRule::BeforeMarketClose(min) => calendar
                .session_close(date)
                .and_then(|c| c.checked_sub_signed(Duration::minutes(min))),
        }
    }
}

pub type ScheduledCallback = Box<dyn FnMut(&mut StrategyContext<'_>) -> StrategyResult + Send>;

pub enum ScheduledAction {
    Callback(ScheduledCallback),
    /// Delivered through `Strategy::on_scheduled`.
    Named(String),
}

impl std::fmt::Debug for ScheduledAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduledAction::Callback(_) => f.write_str("Callback(..)"),
            ScheduledAction::Named(n) => write!(f, "Named({n:?})"),
        }
    }
}

/// One fire of one registered schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueCallback {
    /// Registration order.
    pub entry: u64,
    pub time: NaiveDateTime,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    rule: ScheduleRule,
    action: ScheduledAction,
    registered: NaiveDateTime,
    scan_from: NaiveDate,
    fired_through: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct Scheduler {
    calendar: CalendarSpec,
    entries: Vec<Entry>,
    next_id: u64,
}

impl Scheduler {
    pub fn new(calendar: CalendarSpec) -> Self {
        Self {
            calendar,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn register(&mut self, rule: ScheduleRule, action: ScheduledAction, at: NaiveDateTime) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            rule,
            action,
            registered: at,
            scan_from: at.date(),
            fired_through: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires due at or before `now`, ordered by time then registration.
    pub fn due(&mut self, now: NaiveDateTime) -> Vec<DueCallback> {
        let mut out = Vec::new();
        let today = now.date();
        for e in &mut self.entries {
            let mut d = e.scan_from;
            while d <= today {
                if let Some(t) = e.rule.fire_time(d, &self.calendar) {
                    let fresh = e.fired_through.map_or(true, |f| t > f);
                    if fresh && t >= e.registered && t <= now {
                        out.push(DueCallback { entry: e.id, time: t });
                        e.fired_through = Some(t);
                    }
                }
                match d.succ_opt() {
                    Some(n) => d = n,
                    None => break,
                }
            }
            e.scan_from = today;
        }
        out.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.entry.cmp(&b.entry)));
        out
    }

    /// Run one due fire. Returns the callback label and its result.
    pub fn fire(
        &mut self,
        due: DueCallback,
        ctx: &mut StrategyContext<'_>,
        strategy: &mut dyn Strategy,
    ) -> (String, StrategyResult) {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == due.entry) else {
            return (format!("scheduled#{}", due.entry), Ok(()));
        };
        match &mut entry.action {
            ScheduledAction::Callback(cb) => (format!("scheduled#{}", entry.id), cb(ctx)),
            ScheduledAction::Named(name) => (format!("scheduled:{name}"), strategy.on_scheduled(ctx, name)),
        }
    }
}
