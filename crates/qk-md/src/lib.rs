//! qk-md
//!
//! Historical price plumbing for the kernel:
//! - [`PricePoint`] / [`DataSlice`] / [`Quote`] data types
//! - [`PriceSource`] and [`ContractLookup`] collaborator traits, with an
//!   in-memory implementation of both
//! - [`MarketDataFeed`], the per-step slicer with monotonic cursors
//! - a CSV loader

mod feed;
mod loader;
mod source;
mod types;

pub use feed::MarketDataFeed;
pub use loader::{load_csv_file, parse_csv_points, LoadError};
pub use source::{ContractLookup, InMemoryPriceSource, PriceSource};
pub use types::{DataSlice, PricePoint, Quote, SessionOpen};
