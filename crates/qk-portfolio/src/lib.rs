//! qk-portfolio
//!
//! Cash and holdings accounting for fills. Average-cost positions,
//! fixed-point micros, contract multipliers applied to cash and realized PnL.

mod accounting;
mod types;

pub use accounting::apply_fill;
pub use types::{Fill, Holding, Portfolio, Side};
