use chrono::NaiveDate;
use qk_portfolio::{apply_fill, Fill, Portfolio, Side};
use qk_schemas::{OptionRight, OptionStyle, Symbol};

const M: i64 = 1_000_000;

fn twx_call() -> Symbol {
    Symbol::option(
        &Symbol::equity("TWX"),
        NaiveDate::from_ymd_opt(2014, 6, 21).unwrap(),
        70 * M,
        OptionRight::Call,
        OptionStyle::American,
    )
    .unwrap()
}

#[test]
fn one_contract_moves_cash_by_multiplier() {
    let c = twx_call();
    let mut pf = Portfolio::new(100_000 * M);
    apply_fill(&mut pf, &Fill::new(c.clone(), Side::Buy, 1, 1_500_000));
    assert_eq!(pf.cash_micros, 100_000 * M - 150 * M);
    assert_eq!(pf.quantity(&c), 1);

    // Marked at 2.00 -> 200 of position value.
    let eq = pf.equity_micros(|s| (s == &c).then_some(2 * M));
    assert_eq!(eq, 100_000 * M + 50 * M);

    apply_fill(&mut pf, &Fill::new(c.clone(), Side::Sell, 1, 2 * M));
    assert_eq!(pf.realized_pnl_micros, 50 * M);
    assert!(pf.holdings.is_empty());
}

#[test]
fn unmarked_holding_is_carried_at_cost() {
    let spy = Symbol::equity("SPY");
    let mut pf = Portfolio::new(100_000 * M);
    apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 100, 167_450_000));
    assert_eq!(pf.equity_micros(|_| None), 100_000 * M);
    assert_eq!(pf.holding(&spy).unwrap().average_price_micros(), 167_450_000);
}
