use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use qk_clock::CalendarSpec;
use qk_md::{ContractLookup, InMemoryPriceSource, PriceSource};
use qk_orders::{BuyingPowerPolicy, Order, OrderEvent};
use qk_schemas::{DataNormalizationMode, Instant, Resolution, Symbol};
use qk_universe::{SecurityChanges, SelectionCadence, UnderlyingRelease, UniverseSelector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Plain run settings. Deserializable so `qk-config` can load them from a
/// YAML section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestSettings {
    /// First simulated date (clock starts at 00:00 local exchange time).
    pub start: NaiveDate,
    /// Last simulated date, inclusive.
    pub end: NaiveDate,
    /// Starting cash in micros.
    pub initial_cash_micros: i64,
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
    #[serde(default)]
    pub normalization: DataNormalizationMode,
    #[serde(default)]
    pub calendar: CalendarSpec,
    #[serde(default)]
    pub buying_power: BuyingPowerPolicy,
    #[serde(default)]
    pub underlying_release: UnderlyingRelease,
    #[serde(default)]
    pub selection_cadence: SelectionCadence,
}

fn default_resolution() -> Resolution {
    Resolution::Minute
}

impl BacktestSettings {
    pub fn new(start: NaiveDate, end: NaiveDate, initial_cash_micros: i64, resolution: Resolution) -> Self {
        Self {
            start,
            end,
            initial_cash_micros,
            resolution,
            normalization: DataNormalizationMode::default(),
            calendar: CalendarSpec::default(),
            buying_power: BuyingPowerPolicy::default(),
            underlying_release: UnderlyingRelease::default(),
            selection_cadence: SelectionCadence::default(),
        }
    }

    /// Reasonable defaults for testing: one NYSE week in October 2013,
    /// minute steps, 100k cash.
    pub fn test_defaults() -> Self {
        Self::new(
            NaiveDate::from_ymd_opt(2013, 10, 7).unwrap_or(NaiveDate::MIN),
            NaiveDate::from_ymd_opt(2013, 10, 11).unwrap_or(NaiveDate::MIN),
            100_000_000_000, // 100k USD
            Resolution::Minute,
        )
    }
}

/// Settings plus the universe selector driving membership.
pub struct BacktestConfig {
    pub settings: BacktestSettings,
    pub selector: Option<Box<dyn UniverseSelector>>,
}

impl BacktestConfig {
    pub fn new(settings: BacktestSettings, selector: impl UniverseSelector + 'static) -> Self {
        Self {
            settings,
            selector: Some(Box::new(selector)),
        }
    }

    pub fn without_selector(settings: BacktestSettings) -> Self {
        Self {
            settings,
            selector: None,
        }
    }
}

impl fmt::Debug for BacktestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktestConfig")
            .field("settings", &self.settings)
            .field("selector", &self.selector.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Injected data services. Nothing in the kernel reaches for a global.
#[derive(Clone)]
pub struct Collaborators {
    pub prices: Arc<dyn PriceSource>,
    pub contracts: Arc<dyn ContractLookup>,
}

impl Collaborators {
    pub fn new(prices: Arc<dyn PriceSource>, contracts: Arc<dyn ContractLookup>) -> Self {
        Self { prices, contracts }
    }

    /// One in-memory source serving both prices and the contract listing.
    pub fn in_memory(source: InMemoryPriceSource) -> Self {
        let shared = Arc::new(source);
        Self {
            prices: shared.clone(),
            contracts: shared,
        }
    }
}

/// A strategy callback returned an error; the run stopped at `time`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnhandledStrategyError {
    pub time: Instant,
    /// Callback label, e.g. `on_data` or `scheduled:rebalance`.
    pub callback: String,
    pub message: String,
}

impl fmt::Display for UnhandledStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled strategy error in {} at {}: {}", self.callback, self.time, self.message)
    }
}

impl std::error::Error for UnhandledStrategyError {}

/// End-of-day equity sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity_micros: i64,
    pub cash_micros: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HoldingSummary {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_price_micros: i64,
}

/// Everything a finished (or aborted) run produced.
#[derive(Clone, Debug)]
pub struct RunResult {
    /// Deterministic id derived from settings and strategy name.
    pub replay_id: Uuid,
    pub strategy: String,
    pub settings: BacktestSettings,
    pub final_cash_micros: i64,
    pub realized_pnl_micros: i64,
    /// Non-flat holdings at the end of the run, by symbol.
    pub holdings: Vec<HoldingSummary>,
    /// Orders in id order with their final state.
    pub orders: Vec<Order>,
    /// Order events in delivery order.
    pub order_events: Vec<OrderEvent>,
    /// All security changes of the run merged into one.
    pub security_changes: SecurityChanges,
    pub equity_curve: Vec<EquityPoint>,
    pub warnings: Vec<String>,
    pub steps: u64,
    pub error: Option<UnhandledStrategyError>,
}

impl RunResult {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn fills(&self) -> impl Iterator<Item = &OrderEvent> {
        self.order_events.iter().filter(|e| e.is_fill())
    }

    pub fn final_equity_micros(&self) -> i64 {
        self.equity_curve
            .last()
            .map_or(self.final_cash_micros, |p| p.equity_micros)
    }
}
