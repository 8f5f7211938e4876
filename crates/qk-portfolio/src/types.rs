use std::collections::BTreeMap;

use qk_schemas::Symbol;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side of a signed order quantity.
    pub fn of(quantity: i64) -> Self {
        if quantity < 0 {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}

/// A single executed fill.
///
/// `qty` is always positive. `price_micros` is per unit of the instrument;
/// cash moves by `qty * price * multiplier`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub price_micros: i64,
    pub multiplier: i64,
}

impl Fill {
    pub fn new(symbol: Symbol, side: Side, qty: i64, price_micros: i64) -> Self {
        debug_assert!(qty > 0, "Fill.qty must be > 0");
        debug_assert!(price_micros >= 0, "Fill.price_micros must be >= 0");
        let multiplier = symbol.contract_multiplier();
        Self {
            symbol,
            side,
            qty,
            price_micros,
            multiplier,
        }
    }
}

/// Net position in one symbol, carried at average cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub symbol: Symbol,
    qty_signed: i64,
    avg_price_micros: i64,
}

impl Holding {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            qty_signed: 0,
            avg_price_micros: 0,
        }
    }

    /// Signed quantity (+long, -short, 0 flat).
    pub fn quantity(&self) -> i64 {
        self.qty_signed
    }

    pub fn is_flat(&self) -> bool {
        self.qty_signed == 0
    }

    /// Average entry price of the open quantity; 0 when flat.
    pub fn average_price_micros(&self) -> i64 {
        self.avg_price_micros
    }

    /// Move the position by `delta` units at `px`. Returns the realized PnL
    /// of any quantity closed, in cash micros.
    pub(crate) fn trade(&mut self, delta: i64, px: i64, multiplier: i64) -> i128 {
        let before = self.qty_signed;
        let after = before + delta;

        if before == 0 || before.signum() == delta.signum() {
            let cost = before.abs() as i128 * self.avg_price_micros as i128 + delta.abs() as i128 * px as i128;
            self.avg_price_micros = (cost / after.abs() as i128) as i64;
            self.qty_signed = after;
            return 0;
        }

        let closed = before.abs().min(delta.abs());
        let pnl = closed as i128 * (px - self.avg_price_micros) as i128 * multiplier as i128 * before.signum() as i128;
        self.qty_signed = after;
        if after == 0 {
            self.avg_price_micros = 0;
        } else if after.signum() != before.signum() {
            // Flipped through flat: the remainder opens at this price.
            self.avg_price_micros = px;
        }
        pnl
    }
}

/// Cash plus holdings. Flat holdings are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Portfolio {
    pub initial_cash_micros: i64,
    pub cash_micros: i64,
    pub realized_pnl_micros: i64,
    pub holdings: BTreeMap<Symbol, Holding>,
}

impl Portfolio {
    pub fn new(initial_cash_micros: i64) -> Self {
        Self {
            initial_cash_micros,
            cash_micros: initial_cash_micros,
            realized_pnl_micros: 0,
            holdings: BTreeMap::new(),
        }
    }

    pub fn quantity(&self, symbol: &Symbol) -> i64 {
        self.holdings.get(symbol).map_or(0, Holding::quantity)
    }

    pub fn holding(&self, symbol: &Symbol) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    /// Cash plus marked value of every holding. Holdings without a mark are
    /// carried at their average entry price.
    pub fn equity_micros(&self, mark: impl Fn(&Symbol) -> Option<i64>) -> i64 {
        let mut total = self.cash_micros as i128;
        for h in self.holdings.values() {
            let px = mark(&h.symbol).unwrap_or_else(|| h.average_price_micros());
            total += h.quantity() as i128 * px as i128 * h.symbol.contract_multiplier() as i128;
        }
        total.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}
