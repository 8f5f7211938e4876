//! qk-universe
//!
//! Security registry and universe membership. Each step the manager asks the
//! selector for the universe, folds in manual subscriptions and derived
//! contract dependencies, and diffs the membership against what was last
//! announced to the strategy.

mod changes;
mod manager;
mod security;
mod selector;

pub use changes::{Change, SecurityChanges};
pub use manager::{SelectionCadence, UnderlyingRelease, UniverseError, UniverseManager};
pub use security::Security;
pub use selector::{StaticUniverse, UniverseSelector};
