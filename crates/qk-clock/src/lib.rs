//! qk-clock
//!
//! Deterministic simulated time: the step [`Clock`] that drives a run and the
//! trading session [`CalendarSpec`] used for session opens and schedules.
//! Pure logic. No IO, no wall-clock.

mod calendar;
mod clock;

pub use calendar::{is_us_market_holiday, CalendarSpec};
pub use clock::{Clock, ClockError};
