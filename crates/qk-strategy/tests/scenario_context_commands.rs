//! Command surface exercised against real universe / order book / portfolio
//! state, without the engine loop.

use chrono::NaiveDate;
use qk_clock::CalendarSpec;
use qk_md::InMemoryPriceSource;
use qk_orders::{BuyingPowerPolicy, OrderBook, OrderStatus};
use qk_portfolio::{apply_fill, Fill, Portfolio, Side};
use qk_schemas::{Instant, OptionRight, OptionStyle, Resolution, Symbol};
use qk_strategy::*;
use qk_universe::{StaticUniverse, UniverseError, UniverseManager};

const M: i64 = 1_000_000;

struct World {
    universe: UniverseManager,
    orders: OrderBook,
    portfolio: Portfolio,
    contracts: InMemoryPriceSource,
    schedules: Vec<PendingSchedule>,
}

impl World {
    fn new() -> Self {
        let mut contracts = InMemoryPriceSource::new();
        for strike in [65, 70, 75] {
            contracts.add_contract(twx_call(strike, OptionStyle::American));
        }
        contracts.add_contract(twx_call(60, OptionStyle::European));
        Self {
            universe: UniverseManager::default(),
            orders: OrderBook::new(CalendarSpec::NyseWeekdays, BuyingPowerPolicy::Enforce),
            portfolio: Portfolio::new(100_000 * M),
            contracts,
            schedules: Vec::new(),
        }
    }

    fn ctx(&mut self, now: Instant) -> StrategyContext<'_> {
        StrategyContext::new(
            now,
            CalendarSpec::NyseWeekdays,
            &mut self.universe,
            &mut self.orders,
            &self.portfolio,
            &self.contracts,
            &mut self.schedules,
        )
    }
}

fn now(h: u32, m: u32) -> Instant {
    let t = NaiveDate::from_ymd_opt(2014, 6, 5)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap();
    Instant::new(t, Resolution::Minute)
}

fn expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 6, 21).unwrap()
}

fn twx() -> Symbol {
    Symbol::equity("TWX")
}

fn twx_call(strike: i64, style: OptionStyle) -> Symbol {
    Symbol::option(&twx(), expiry(), strike * M, OptionRight::Call, style).unwrap()
}

#[test]
fn derived_contract_picks_first_matching_listing() {
    let mut w = World::new();
    let mut ctx = w.ctx(now(10, 0));
    assert_eq!(ctx.option_chain(&twx()).len(), 4);

    let picked = ctx
        .add_derived_contract(&twx(), expiry(), OptionRight::Call, OptionStyle::American)
        .unwrap();
    assert_eq!(picked, twx_call(65, OptionStyle::American));
    assert!(ctx.security(&picked).unwrap().is_manual());
    assert!(ctx.security(&twx()).unwrap().is_subscribed());

    let err = ctx
        .add_derived_contract(&twx(), expiry(), OptionRight::Put, OptionStyle::American)
        .unwrap_err();
    assert!(matches!(err, UniverseError::NoMatchingContract { .. }));
}

#[test]
fn remove_instrument_cancels_open_orders() {
    let mut w = World::new();
    let c = twx_call(70, OptionStyle::American);
    let mut ctx = w.ctx(now(10, 0));
    ctx.add_option_contract(&c).unwrap();
    let o = ctx.buy(&c, 1).unwrap();

    let canceled = ctx.remove_instrument(&c).unwrap();
    assert_eq!(canceled.len(), 1);
    assert_eq!(ctx.order(o.id).unwrap().status, OrderStatus::Canceled);

    let err = ctx.remove_instrument(&Symbol::equity("NOPE")).unwrap_err();
    assert_eq!(err, UniverseError::UnknownSymbol(Symbol::equity("NOPE")));
}

#[test]
fn liquidate_flattens_holdings() {
    let mut w = World::new();
    let spy = Symbol::equity("SPY");
    w.universe.resolve(&now(9, 30), &mut StaticUniverse::new([spy.clone()]));
    apply_fill(&mut w.portfolio, &Fill::new(spy.clone(), Side::Buy, 30, 190 * M));

    let mut ctx = w.ctx(now(10, 0));
    let pending = ctx.market_on_open_order(&spy, 5).unwrap();
    let orders = ctx.liquidate(Some(&spy)).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, -30);
    assert_eq!(ctx.order(pending.id).unwrap().status, OrderStatus::Canceled);
}

#[test]
fn schedules_are_queued_with_registration_time() {
    let mut w = World::new();
    let mut ctx = w.ctx(now(10, 0));
    ctx.schedule_named(ScheduleRule::every_day_at(15, 0), "rebalance");
    ctx.schedule(ScheduleRule::every_day_at(15, 30), |_ctx| Ok(()));
    assert_eq!(w.schedules.len(), 2);
    assert_eq!(w.schedules[0].registered, now(10, 0).time());
}

#[test]
fn rejected_commands_convert_into_strategy_errors() {
    let mut w = World::new();
    let mut ctx = w.ctx(now(10, 0));
    let err: StrategyError = ctx.buy(&Symbol::equity("ZZZ"), 1).unwrap_err().into();
    assert!(matches!(err, StrategyError::Order(_)));
    assert!(err.to_string().contains("ZZZ"));
}
