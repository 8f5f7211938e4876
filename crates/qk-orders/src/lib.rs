//! qk-orders
//!
//! Order book and matching engine for simulated fills.
//!
//! Orders move `Submitted -> Filled | Canceled` exactly once. Fills are
//! atomic. Every transition produces an [`OrderEvent`], queued until the
//! dispatcher drains it.

mod book;
mod error;
mod types;

pub use book::OrderBook;
pub use error::{OrderError, TransitionError};
pub use types::{BuyingPowerPolicy, Order, OrderEvent, OrderId, OrderRequest, OrderStatus, OrderType};
