use crate::types::{Fill, Holding, Portfolio, Side};

fn i128_to_i64_clamp(x: i128) -> i64 {
    x.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Apply a fill at average cost.
///
/// Cash moves by `qty * price * multiplier`. Adding to a position re-weights
/// its average price; reducing it realizes PnL against that average; crossing
/// through flat re-opens the remainder at the fill price.
pub fn apply_fill(pf: &mut Portfolio, f: &Fill) {
    debug_assert!(f.qty > 0);

    let cash = i128_to_i64_clamp(f.qty as i128 * f.price_micros as i128 * f.multiplier as i128);
    let delta = match f.side {
        Side::Buy => {
            pf.cash_micros = pf.cash_micros.saturating_sub(cash);
            f.qty
        }
        Side::Sell => {
            pf.cash_micros = pf.cash_micros.saturating_add(cash);
            -f.qty
        }
    };

    let pos = pf
        .holdings
        .entry(f.symbol.clone())
        .or_insert_with(|| Holding::new(f.symbol.clone()));
    let pnl = pos.trade(delta, f.price_micros, f.multiplier);
    let flat = pos.is_flat();
    pf.realized_pnl_micros = pf.realized_pnl_micros.saturating_add(i128_to_i64_clamp(pnl));

    if flat {
        pf.holdings.remove(&f.symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qk_schemas::Symbol;

    const M: i64 = 1_000_000;

    #[test]
    fn partial_sell_realizes_against_average() {
        let spy = Symbol::equity("SPY");
        let mut pf = Portfolio::new(100_000 * M);
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 100, 167 * M));
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Sell, 40, 170 * M));
        assert_eq!(pf.quantity(&spy), 60);
        assert_eq!(pf.realized_pnl_micros, 120 * M);
        assert_eq!(pf.cash_micros, (100_000 - 16_700 + 6_800) * M);
        assert_eq!(pf.holding(&spy).unwrap().average_price_micros(), 167 * M);
    }

    #[test]
    fn adds_reweight_the_average() {
        let spy = Symbol::equity("SPY");
        let mut pf = Portfolio::new(100_000 * M);
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 100, 100 * M));
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 100, 110 * M));
        assert_eq!(pf.holding(&spy).unwrap().average_price_micros(), 105 * M);

        // Sell 150 at 120: 150 x (120 - 105) realized.
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Sell, 150, 120 * M));
        assert_eq!(pf.realized_pnl_micros, 2_250 * M);
        assert_eq!(pf.quantity(&spy), 50);
        assert_eq!(pf.holding(&spy).unwrap().average_price_micros(), 105 * M);
    }

    #[test]
    fn short_then_cover_flattens() {
        let spy = Symbol::equity("SPY");
        let mut pf = Portfolio::new(0);
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Sell, 10, 50 * M));
        assert_eq!(pf.quantity(&spy), -10);
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 10, 45 * M));
        assert!(pf.holding(&spy).is_none());
        assert_eq!(pf.realized_pnl_micros, 50 * M);
        assert_eq!(pf.cash_micros, 50 * M);
    }

    #[test]
    fn crossing_flat_reopens_at_fill_price() {
        let spy = Symbol::equity("SPY");
        let mut pf = Portfolio::new(10_000 * M);
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Buy, 10, 100 * M));
        apply_fill(&mut pf, &Fill::new(spy.clone(), Side::Sell, 15, 90 * M));
        assert_eq!(pf.realized_pnl_micros, -100 * M);
        let h = pf.holding(&spy).unwrap();
        assert_eq!(h.quantity(), -5);
        assert_eq!(h.average_price_micros(), 90 * M);
    }
}
