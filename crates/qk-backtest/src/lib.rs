//! qk-backtest
//!
//! Step-synchronous backtest kernel.
//!
//! Pipeline per clock step: UNIVERSE -> DATA -> MATCHING -> DISPATCH
//!
//! - Deterministic replay (same prices + settings + strategy => identical result)
//! - Security changes always reach the strategy before the same step's data
//! - Commands issued in a callback take effect from the next phase
//! - Orders submitted at a step are never filled at that same step
//! - Market-on-open orders fill at the next session's opening print
//! - FIFO portfolio accounting via qk-portfolio

mod engine;
pub mod types;

pub use engine::{run, validate_settings, BacktestEngine, BacktestError, ConfigurationError};
pub use types::{
    BacktestConfig, BacktestSettings, Collaborators, EquityPoint, HoldingSummary, RunResult, UnhandledStrategyError,
};
