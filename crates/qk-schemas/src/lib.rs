//! qk-schemas
//!
//! Shared data model for the kernel: simulated time, instrument identity and
//! fixed-point price helpers. Pure types, no IO.

mod price;
mod symbol;
mod time;

pub use price::{format_micros, parse_price_micros, MICROS_SCALE};
pub use symbol::{Market, OptionContract, OptionRight, OptionStyle, SecurityType, Symbol, SymbolError};
pub use time::{DataNormalizationMode, Instant, Resolution};
