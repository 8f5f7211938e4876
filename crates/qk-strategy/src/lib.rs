//! qk-strategy
//!
//! The strategy side of the kernel: the [`Strategy`] callback trait, the
//! [`StrategyContext`] command surface handed to every callback, declarative
//! schedules, the single-strategy [`StrategyHost`] and a name -> factory
//! [`StrategyRegistry`].

mod context;
mod host;
mod registry;
mod schedule;
mod types;

pub use context::{PendingSchedule, StrategyContext};
pub use host::StrategyHost;
pub use registry::{RegistryError, StrategyFactory, StrategyMeta, StrategyRegistry};
pub use schedule::{DateRule, DueCallback, ScheduleRule, ScheduledAction, ScheduledCallback, Scheduler, TimeRule};
pub use types::{Strategy, StrategyError, StrategyHostError, StrategyResult, StrategySpec};
