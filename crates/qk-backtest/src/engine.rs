use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use qk_clock::{CalendarSpec, Clock};
use qk_md::{ContractLookup, DataSlice, MarketDataFeed};
use qk_orders::{OrderBook, OrderEvent};
use qk_portfolio::{apply_fill, Fill, Portfolio, Side};
use qk_schemas::{format_micros, Instant, Symbol};
use qk_strategy::{
    PendingSchedule, Scheduler, Strategy, StrategyContext, StrategyError, StrategyHost, StrategyHostError,
};
use qk_universe::{SecurityChanges, UniverseManager, UniverseSelector};
use tracing::{error, info};
use uuid::Uuid;

use crate::types::{
    BacktestConfig, BacktestSettings, Collaborators, EquityPoint, HoldingSummary, RunResult, UnhandledStrategyError,
};

/// Rejected before the first step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    MissingSelector,
    EmptySelector,
    NonPositiveCash { initial_cash_micros: i64 },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDateRange { start, end } => {
                write!(f, "invalid date range: end {end} is before start {start}")
            }
            Self::MissingSelector => write!(f, "no universe selector configured"),
            Self::EmptySelector => write!(f, "universe selector has no symbols"),
            Self::NonPositiveCash { initial_cash_micros } => write!(
                f,
                "initial cash must be positive, got {}",
                format_micros(*initial_cash_micros)
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BacktestError {
    Configuration(ConfigurationError),
    StrategyHost(StrategyHostError),
}

impl std::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::StrategyHost(e) => write!(f, "strategy host error: {e}"),
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<ConfigurationError> for BacktestError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<StrategyHostError> for BacktestError {
    fn from(e: StrategyHostError) -> Self {
        Self::StrategyHost(e)
    }
}

/// Check the plain settings. Selector checks happen in [`BacktestEngine::new`].
pub fn validate_settings(settings: &BacktestSettings) -> Result<(), ConfigurationError> {
    if settings.end < settings.start {
        return Err(ConfigurationError::InvalidDateRange {
            start: settings.start,
            end: settings.end,
        });
    }
    if settings.initial_cash_micros <= 0 {
        return Err(ConfigurationError::NonPositiveCash {
            initial_cash_micros: settings.initial_cash_micros,
        });
    }
    Ok(())
}

/// Step-synchronous backtest driver.
pub struct BacktestEngine {
    /// Validated run settings.
    settings: BacktestSettings,
    /// Universe selection model, consulted every step.
    selector: Box<dyn UniverseSelector>,
    /// Injected price and contract services.
    collaborators: Collaborators,
    /// Single-strategy host.
    host: StrategyHost,
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("settings", &self.settings)
            .field("strategy_registered", &self.host.is_registered())
            .finish_non_exhaustive()
    }
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig, collaborators: Collaborators) -> Result<Self, ConfigurationError> {
        let BacktestConfig { settings, selector } = config;
        validate_settings(&settings)?;
        let selector = selector.ok_or(ConfigurationError::MissingSelector)?;
        if selector.is_empty() {
            return Err(ConfigurationError::EmptySelector);
        }
        Ok(Self {
            settings,
            selector,
            collaborators,
            host: StrategyHost::new(),
        })
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    /// Register the strategy. Must be called before run().
    pub fn add_strategy(&mut self, s: Box<dyn Strategy>) -> Result<(), BacktestError> {
        self.host.register(s).map_err(BacktestError::StrategyHost)
    }

    /// Run every clock step from `start` to the end of `end`.
    ///
    /// Per step:
    /// 1. Resolve the universe into SecurityChanges
    /// 2. Slice data for the announced symbols and update security prices
    /// 3. Match open orders submitted before this step and apply fills
    /// 4. Dispatch changes, then data, then order events merged with due
    ///    scheduled callbacks
    /// 5. Install schedules registered during the step
    /// 6. Sample equity after the last step of each date
    ///
    /// A strategy error stops the run; the partial result carries it.
    pub fn run(mut self) -> Result<RunResult, BacktestError> {
        let spec = self.host.spec()?;
        self.host.check_resolution(self.settings.resolution)?;

        let settings = self.settings.clone();
        let mut clock = Clock::new(settings.start, settings.end, settings.resolution).map_err(|_| {
            ConfigurationError::InvalidDateRange {
                start: settings.start,
                end: settings.end,
            }
        })?;

        let mut run = RunState {
            kernel: Kernel::new(&settings, self.collaborators.contracts.clone()),
            scheduler: Scheduler::new(settings.calendar),
            feed: MarketDataFeed::new(
                self.collaborators.prices.clone(),
                settings.calendar,
                settings.normalization,
            ),
            marks: BTreeMap::new(),
            merged: SecurityChanges::none(),
            delivered: Vec::new(),
        };
        let strategy = self.host.strategy_mut()?;

        info!(
            strategy = %spec.name,
            start = %settings.start,
            end = %settings.end,
            resolution = %settings.resolution,
            cash = %format_micros(settings.initial_cash_micros),
            "backtest started"
        );

        let mut steps: u64 = 0;
        let mut equity_curve = Vec::new();

        let start = Instant::start_of(settings.start, settings.resolution);
        let mut failure = {
            let mut ctx = run.kernel.context(start);
            strategy
                .initialize(&mut ctx)
                .err()
                .map(|e| unhandled(start, "initialize", e))
        };
        run.kernel.install_schedules(&mut run.scheduler);

        if failure.is_none() {
            while let Some(now) = clock.advance() {
                steps += 1;
                let outcome = run.step(now, self.selector.as_mut(), strategy);
                run.kernel.install_schedules(&mut run.scheduler);
                if let Err(e) = outcome {
                    failure = Some(e);
                    break;
                }
                let day_ends = clock.peek().map_or(true, |next| next.date() != now.date());
                if day_ends {
                    equity_curve.push(run.equity_point(now.date()));
                }
            }
        }

        // Events queued during the final step were never delivered.
        let mut order_events = run.delivered;
        order_events.extend(run.kernel.orders.drain_events());

        let portfolio = &run.kernel.portfolio;
        let holdings = portfolio
            .holdings
            .values()
            .filter(|h| !h.is_flat())
            .map(|h| HoldingSummary {
                symbol: h.symbol.clone(),
                quantity: h.quantity(),
                average_price_micros: h.average_price_micros(),
            })
            .collect();

        let result = RunResult {
            replay_id: replay_id(&spec.name, &settings),
            strategy: spec.name,
            final_cash_micros: portfolio.cash_micros,
            realized_pnl_micros: portfolio.realized_pnl_micros,
            holdings,
            orders: run.kernel.orders.orders().cloned().collect(),
            order_events,
            security_changes: run.merged,
            equity_curve,
            warnings: run.kernel.orders.warnings().to_vec(),
            steps,
            error: failure,
            settings,
        };

        info!(
            steps = result.steps,
            orders = result.orders.len(),
            fills = result.fills().count(),
            cash = %format_micros(result.final_cash_micros),
            complete = result.is_complete(),
            "backtest finished"
        );
        Ok(result)
    }
}

/// Build an engine, register `strategy` and run it.
pub fn run(
    config: BacktestConfig,
    collaborators: Collaborators,
    strategy: Box<dyn Strategy>,
) -> Result<RunResult, BacktestError> {
    let mut engine = BacktestEngine::new(config, collaborators)?;
    engine.add_strategy(strategy)?;
    engine.run()
}

/// Same settings and strategy name always map to the same id.
fn replay_id(strategy: &str, settings: &BacktestSettings) -> Uuid {
    let seed = format!("{strategy}|{settings:?}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
}

fn unhandled(now: Instant, callback: &str, e: StrategyError) -> UnhandledStrategyError {
    error!(time = %now, callback, error = %e, "unhandled strategy error, aborting run");
    UnhandledStrategyError {
        time: now,
        callback: callback.to_string(),
        message: e.to_string(),
    }
}

/// State a strategy context borrows.
struct Kernel {
    calendar: CalendarSpec,
    universe: UniverseManager,
    orders: OrderBook,
    portfolio: Portfolio,
    contracts: Arc<dyn ContractLookup>,
    pending: Vec<PendingSchedule>,
}

impl Kernel {
    fn new(settings: &BacktestSettings, contracts: Arc<dyn ContractLookup>) -> Self {
        Self {
            calendar: settings.calendar,
            universe: UniverseManager::new(settings.underlying_release, settings.selection_cadence),
            orders: OrderBook::new(settings.calendar, settings.buying_power),
            portfolio: Portfolio::new(settings.initial_cash_micros),
            contracts,
            pending: Vec::new(),
        }
    }

    fn context(&mut self, now: Instant) -> StrategyContext<'_> {
        StrategyContext::new(
            now,
            self.calendar,
            &mut self.universe,
            &mut self.orders,
            &self.portfolio,
            self.contracts.as_ref(),
            &mut self.pending,
        )
    }

    fn install_schedules(&mut self, scheduler: &mut Scheduler) {
        for p in self.pending.drain(..) {
            scheduler.register(p.rule, p.action, p.registered);
        }
    }
}

struct RunState {
    kernel: Kernel,
    scheduler: Scheduler,
    feed: MarketDataFeed,
    /// Last seen price per symbol, kept after a security leaves the universe.
    marks: BTreeMap<Symbol, i64>,
    merged: SecurityChanges,
    delivered: Vec<OrderEvent>,
}

impl RunState {
    fn step(
        &mut self,
        now: Instant,
        selector: &mut dyn UniverseSelector,
        strategy: &mut dyn Strategy,
    ) -> Result<(), UnhandledStrategyError> {
        let changes = self.kernel.universe.resolve(&now, selector);

        let symbols: Vec<Symbol> = self.kernel.universe.data_symbols().cloned().collect();
        let slice = self.feed.slice(now, symbols.iter());
        self.kernel.universe.update_prices(&slice);
        for (symbol, quote) in slice.iter() {
            self.marks.insert(symbol.clone(), quote.price_micros);
        }

        self.apply_fills(now, &slice);

        if !changes.is_empty() {
            self.merged.absorb(&changes);
            let mut ctx = self.kernel.context(now);
            strategy
                .on_securities_changed(&mut ctx, &changes)
                .map_err(|e| unhandled(now, "on_securities_changed", e))?;
        }

        if !slice.is_empty() {
            let mut ctx = self.kernel.context(now);
            strategy
                .on_data(&mut ctx, &slice)
                .map_err(|e| unhandled(now, "on_data", e))?;
        }

        self.dispatch_events_and_schedules(now, strategy)
    }

    fn apply_fills(&mut self, now: Instant, slice: &DataSlice) {
        for ev in self.kernel.orders.evaluate(now, slice) {
            let Some(price) = ev.fill_price_micros else {
                continue;
            };
            let fill = Fill::new(ev.symbol.clone(), Side::of(ev.quantity), ev.quantity.abs(), price);
            apply_fill(&mut self.kernel.portfolio, &fill);
        }
    }

    /// Order events and due schedules interleaved by time; an order event
    /// wins a tie.
    fn dispatch_events_and_schedules(
        &mut self,
        now: Instant,
        strategy: &mut dyn Strategy,
    ) -> Result<(), UnhandledStrategyError> {
        let mut events = self.kernel.orders.drain_events().into_iter().peekable();
        let mut due = self.scheduler.due(now.time()).into_iter().peekable();

        loop {
            let event_first = match (events.peek(), due.peek()) {
                (Some(e), Some(d)) => e.time <= d.time,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => return Ok(()),
            };
            if event_first {
                let Some(ev) = events.next() else {
                    return Ok(());
                };
                self.delivered.push(ev.clone());
                let mut ctx = self.kernel.context(now);
                strategy
                    .on_order_event(&mut ctx, &ev)
                    .map_err(|e| unhandled(now, "on_order_event", e))?;
            } else {
                let Some(d) = due.next() else {
                    return Ok(());
                };
                let mut ctx = self.kernel.context(now);
                let (label, res) = self.scheduler.fire(d, &mut ctx, strategy);
                res.map_err(|e| unhandled(now, &label, e))?;
            }
        }
    }

    fn equity_point(&self, date: NaiveDate) -> EquityPoint {
        let portfolio = &self.kernel.portfolio;
        EquityPoint {
            date,
            equity_micros: portfolio.equity_micros(|s| self.marks.get(s).copied()),
            cash_micros: portfolio.cash_micros,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qk_md::InMemoryPriceSource;
    use qk_schemas::Resolution;
    use qk_strategy::StrategySpec;
    use qk_universe::StaticUniverse;

    struct Idle;
    impl Strategy for Idle {
        fn spec(&self) -> StrategySpec {
            StrategySpec::new("idle")
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig::new(
            BacktestSettings::test_defaults(),
            StaticUniverse::new([Symbol::equity("SPY")]),
        )
    }

    #[test]
    fn replay_id_is_deterministic() {
        let s = BacktestSettings::test_defaults();
        assert_eq!(replay_id("a", &s), replay_id("a", &s));
        assert_ne!(replay_id("a", &s), replay_id("b", &s));
    }

    #[test]
    fn run_without_strategy_is_rejected() {
        let engine = BacktestEngine::new(config(), Collaborators::in_memory(InMemoryPriceSource::new())).unwrap();
        assert_eq!(
            engine.run().unwrap_err(),
            BacktestError::StrategyHost(StrategyHostError::NoStrategyRegistered)
        );
    }

    #[test]
    fn strategy_resolution_must_match_clock() {
        struct TickOnly;
        impl Strategy for TickOnly {
            fn spec(&self) -> StrategySpec {
                StrategySpec::new("tick-only").with_resolution(Resolution::Tick)
            }
        }
        let err = run(
            config(),
            Collaborators::in_memory(InMemoryPriceSource::new()),
            Box::new(TickOnly),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::StrategyHost(StrategyHostError::ResolutionMismatch { .. })
        ));
    }

    #[test]
    fn idle_run_samples_one_equity_point_per_day() {
        let res = run(
            config(),
            Collaborators::in_memory(InMemoryPriceSource::new()),
            Box::new(Idle),
        )
        .unwrap();
        assert!(res.is_complete());
        assert_eq!(res.steps, 5 * 1440);
        assert_eq!(res.equity_curve.len(), 5);
        assert!(res
            .equity_curve
            .iter()
            .all(|p| p.equity_micros == 100_000_000_000));
        // SPY was announced once and never removed.
        assert!(res.security_changes.is_added(&Symbol::equity("SPY")));
    }
}
