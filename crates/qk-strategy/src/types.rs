use std::fmt;

use qk_md::DataSlice;
use qk_orders::{OrderError, OrderEvent};
use qk_schemas::Resolution;
use qk_universe::{SecurityChanges, UniverseError};

use crate::context::StrategyContext;

/// Strategy identity and the clock resolution it was written for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategySpec {
    pub name: String,
    /// `None` accepts any run resolution.
    pub resolution: Option<Resolution>,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// Error surfaced from a strategy callback. Unhandled errors abort the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyError {
    Order(OrderError),
    Universe(UniverseError),
    Message(String),
}

impl StrategyError {
    pub fn msg(m: impl Into<String>) -> Self {
        StrategyError::Message(m.into())
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyError::Order(e) => write!(f, "order command failed: {e}"),
            StrategyError::Universe(e) => write!(f, "universe command failed: {e}"),
            StrategyError::Message(m) => f.write_str(m),
        }
    }
}

impl std::error::Error for StrategyError {}

impl From<OrderError> for StrategyError {
    fn from(e: OrderError) -> Self {
        StrategyError::Order(e)
    }
}

impl From<UniverseError> for StrategyError {
    fn from(e: UniverseError) -> Self {
        StrategyError::Universe(e)
    }
}

pub type StrategyResult = Result<(), StrategyError>;

/// Lifecycle callbacks. Every hook defaults to a no-op.
pub trait Strategy: Send {
    fn spec(&self) -> StrategySpec;

    fn initialize(&mut self, _ctx: &mut StrategyContext<'_>) -> StrategyResult {
        Ok(())
    }

    fn on_securities_changed(&mut self, _ctx: &mut StrategyContext<'_>, _changes: &SecurityChanges) -> StrategyResult {
        Ok(())
    }

    fn on_data(&mut self, _ctx: &mut StrategyContext<'_>, _slice: &DataSlice) -> StrategyResult {
        Ok(())
    }

    fn on_order_event(&mut self, _ctx: &mut StrategyContext<'_>, _event: &OrderEvent) -> StrategyResult {
        Ok(())
    }

    /// Delivery of schedules registered with `schedule_named`.
    fn on_scheduled(&mut self, _ctx: &mut StrategyContext<'_>, _name: &str) -> StrategyResult {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyHostError {
    MultiStrategyNotAllowed,
    NoStrategyRegistered,
    ResolutionMismatch { expected: Resolution, got: Resolution },
}

impl fmt::Display for StrategyHostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyHostError::MultiStrategyNotAllowed => write!(f, "only one strategy may be registered"),
            StrategyHostError::NoStrategyRegistered => write!(f, "no strategy registered"),
            StrategyHostError::ResolutionMismatch { expected, got } => {
                write!(f, "strategy expects {expected} resolution, run uses {got}")
            }
        }
    }
}

impl std::error::Error for StrategyHostError {}
