use chrono::{NaiveDate, NaiveDateTime};
use qk_backtest::{BacktestConfig, BacktestEngine, BacktestSettings, Collaborators, RunResult};
use qk_md::{InMemoryPriceSource, PricePoint};
use qk_orders::OrderStatus;
use qk_schemas::{Resolution, Symbol};
use qk_strategy::{DateRule, ScheduleRule, Strategy, StrategyContext, StrategyResult, StrategySpec, TimeRule};
use qk_universe::StaticUniverse;

const M: i64 = 1_000_000;

/// Market buy at midday, long after the morning print.
struct MiddayBuy {
    spy: Symbol,
}

impl Strategy for MiddayBuy {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("midday-buy")
    }

    fn initialize(&mut self, ctx: &mut StrategyContext<'_>) -> StrategyResult {
        ctx.add_instrument(&self.spy)?;
        ctx.schedule_named(
            ScheduleRule::new(DateRule::On(date(7)), TimeRule::At(12, 0)),
            "buy",
        );
        Ok(())
    }

    fn on_scheduled(&mut self, ctx: &mut StrategyContext<'_>, _name: &str) -> StrategyResult {
        ctx.buy(&self.spy, 10)?;
        Ok(())
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 10, day).unwrap()
}

fn t(day: u32, h: u32, m: u32) -> NaiveDateTime {
    date(day).and_hms_opt(h, m, 0).unwrap()
}

fn run_midday() -> RunResult {
    let spy = Symbol::equity("SPY");
    let source = InMemoryPriceSource::from_points(vec![
        PricePoint::new(spy.clone(), t(7, 9, 30), 100 * M),
        PricePoint::new(spy.clone(), t(8, 9, 30), 110 * M),
    ]);
    let settings = BacktestSettings::new(date(7), date(8), 10_000 * M, Resolution::Minute);
    let config = BacktestConfig::new(settings, StaticUniverse::new([spy.clone()]));
    let mut engine = BacktestEngine::new(config, Collaborators::in_memory(source)).unwrap();
    engine.add_strategy(Box::new(MiddayBuy { spy })).unwrap();
    engine.run().expect("run backtest")
}

#[test]
fn market_order_waits_for_a_print_after_submission() {
    let res = run_midday();
    assert!(res.is_complete(), "{:?}", res.error);

    assert_eq!(res.orders.len(), 1);
    let o = &res.orders[0];
    assert_eq!(o.submitted.time(), t(7, 12, 0));
    assert_eq!(o.status, OrderStatus::Filled);
    // The 09:30 print on the 7th predates the order; the next day's does not.
    assert_eq!(o.fill_price_micros, Some(110 * M));
    assert_eq!(o.fill_time, Some(t(8, 9, 30)));

    assert_eq!(res.final_cash_micros, 8_900 * M);
    assert_eq!(res.holdings[0].quantity, 10);
}

#[test]
fn fill_event_is_stamped_with_the_print_time() {
    let res = run_midday();
    let fill = res.fills().next().expect("one fill");
    assert_eq!(fill.fill_time, Some(t(8, 9, 30)));
    assert_eq!(fill.time, t(8, 9, 30));
}
