use chrono::NaiveDate;
use qk_backtest::{BacktestConfig, BacktestEngine, BacktestSettings, Collaborators};
use qk_md::{parse_csv_points, InMemoryPriceSource};
use qk_orders::{OrderId, OrderStatus, OrderType};
use qk_schemas::{Resolution, Symbol};
use qk_strategy::{ScheduleRule, Strategy, StrategyContext, StrategyResult, StrategySpec};
use qk_universe::StaticUniverse;

const TICKS_CSV: &str = include_str!("fixtures/spy_moo_ticks.csv");
const M: i64 = 1_000_000;

/// Buys 100 SPY market-on-open every afternoon at 15:00.
struct MooDaily {
    spy: Symbol,
}

impl Strategy for MooDaily {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("moo-daily").with_resolution(Resolution::Tick)
    }

    fn initialize(&mut self, ctx: &mut StrategyContext<'_>) -> StrategyResult {
        ctx.add_instrument(&self.spy)?;
        ctx.schedule_named(ScheduleRule::every_day_at(15, 0), "moo");
        Ok(())
    }

    fn on_scheduled(&mut self, ctx: &mut StrategyContext<'_>, name: &str) -> StrategyResult {
        assert_eq!(name, "moo");
        ctx.market_on_open_order(&self.spy, 100)?;
        Ok(())
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 10, day).unwrap()
}

fn run_moo() -> qk_backtest::RunResult {
    let points = parse_csv_points(TICKS_CSV).expect("parse fixture csv");
    let source = InMemoryPriceSource::from_points(points);

    let spy = Symbol::equity("SPY");
    let settings = BacktestSettings::new(date(7), date(9), 100_000 * M, Resolution::Tick);
    let config = BacktestConfig::new(settings, StaticUniverse::new([spy.clone()]));

    let mut engine = BacktestEngine::new(config, Collaborators::in_memory(source)).unwrap();
    engine.add_strategy(Box::new(MooDaily { spy })).unwrap();
    engine.run().expect("run backtest")
}

#[test]
fn market_on_open_orders_fill_at_next_session_open() {
    let res = run_moo();
    assert!(res.is_complete(), "{:?}", res.error);
    assert_eq!(res.steps, 3 * 86_400);

    assert_eq!(res.orders.len(), 3);
    let o = &res.orders;
    assert!(o.iter().all(|o| o.order_type == OrderType::MarketOnOpen));

    assert_eq!(o[0].id, OrderId(1));
    assert_eq!(o[0].status, OrderStatus::Filled);
    assert_eq!(o[0].fill_price_micros, Some(167_450_000));
    assert_eq!(o[0].fill_time, Some(date(8).and_hms_opt(9, 30, 0).unwrap()));

    assert_eq!(o[1].status, OrderStatus::Filled);
    assert_eq!(o[1].fill_price_micros, Some(165_820_000));
    assert_eq!(o[1].fill_time, Some(date(9).and_hms_opt(9, 30, 0).unwrap()));

    // Submitted on the last simulated afternoon: no later session to open.
    assert_eq!(o[2].status, OrderStatus::Submitted);
    assert_eq!(o[2].submitted.time(), date(9).and_hms_opt(15, 0, 0).unwrap());

    assert_eq!(res.final_cash_micros, 66_673 * M);
    assert_eq!(res.holdings.len(), 1);
    assert_eq!(res.holdings[0].quantity, 200);
}

#[test]
fn order_events_follow_submission_then_fill() {
    let res = run_moo();
    let trail: Vec<(u64, OrderStatus)> = res
        .order_events
        .iter()
        .map(|e| (e.order_id.0, e.status))
        .collect();
    assert_eq!(
        trail,
        vec![
            (1, OrderStatus::Submitted),
            (1, OrderStatus::Filled),
            (2, OrderStatus::Submitted),
            (2, OrderStatus::Filled),
            (3, OrderStatus::Submitted),
        ]
    );
    assert_eq!(res.fills().count(), 2);
}

#[test]
fn equity_is_sampled_at_each_day_end() {
    let res = run_moo();
    let dates: Vec<NaiveDate> = res.equity_curve.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![date(7), date(8), date(9)]);

    assert_eq!(res.equity_curve[0].equity_micros, 100_000 * M);
    // 10-09 close: 66_673 cash + 200 x 166.96.
    assert_eq!(res.final_equity_micros(), 100_065 * M);
}

#[test]
fn replay_is_deterministic() {
    let a = run_moo();
    let b = run_moo();
    assert_eq!(a.replay_id, b.replay_id);
    assert_eq!(a.orders, b.orders);
    assert_eq!(a.order_events, b.order_events);
    assert_eq!(a.equity_curve, b.equity_curve);
}
