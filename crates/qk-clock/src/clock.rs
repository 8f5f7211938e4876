use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use qk_schemas::{Instant, Resolution};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClockError {
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::InvalidRange { start, end } => {
                write!(f, "invalid clock range: end {end} is before start {start}")
            }
        }
    }
}

impl std::error::Error for ClockError {}

/// Step clock over `[start 00:00:00, end_date + 1 day)`.
///
/// Instants are strictly increasing by the resolution step. Once the end is
/// passed the clock is exhausted for good.
#[derive(Clone, Debug)]
pub struct Clock {
    next: Option<NaiveDateTime>,
    end_exclusive: NaiveDateTime,
    resolution: Resolution,
    step: Duration,
}

impl Clock {
    pub fn new(start: NaiveDate, end: NaiveDate, resolution: Resolution) -> Result<Self, ClockError> {
        if end < start {
            return Err(ClockError::InvalidRange { start, end });
        }
        let end_exclusive = end
            .and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::days(1))
            .ok_or(ClockError::InvalidRange { start, end })?;
        Ok(Self {
            next: Some(start.and_time(NaiveTime::MIN)),
            end_exclusive,
            resolution,
            step: resolution.step(),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Next instant without consuming it.
    pub fn peek(&self) -> Option<Instant> {
        self.next
            .filter(|t| *t < self.end_exclusive)
            .map(|t| Instant::new(t, self.resolution))
    }

    pub fn advance(&mut self) -> Option<Instant> {
        let Some(current) = self.peek() else {
            self.next = None;
            return None;
        };
        self.next = current.time().checked_add_signed(self.step);
        Some(current)
    }
}

impl Iterator for Clock {
    type Item = Instant;

    fn next(&mut self) -> Option<Instant> {
        self.advance()
    }
}
