//! The command surface a strategy sees during a callback.
//!
//! A context borrows the engine's state for the duration of one callback.
//! Orders and subscriptions issued here take effect from the next phase.

use chrono::{NaiveDate, NaiveDateTime};
use qk_clock::CalendarSpec;
use qk_md::ContractLookup;
use qk_orders::{Order, OrderBook, OrderError, OrderEvent, OrderId, OrderRequest};
use qk_portfolio::Portfolio;
use qk_schemas::{Instant, OptionRight, OptionStyle, Symbol};
use qk_universe::{Security, UniverseError, UniverseManager};
use tracing::warn;

use crate::schedule::{ScheduleRule, ScheduledAction};
use crate::types::StrategyResult;

/// A schedule registered during a callback, installed once the step ends.
#[derive(Debug)]
pub struct PendingSchedule {
    pub rule: ScheduleRule,
    pub action: ScheduledAction,
    pub registered: NaiveDateTime,
}

pub struct StrategyContext<'a> {
    now: Instant,
    calendar: CalendarSpec,
    universe: &'a mut UniverseManager,
    orders: &'a mut OrderBook,
    portfolio: &'a Portfolio,
    contracts: &'a dyn ContractLookup,
    schedules: &'a mut Vec<PendingSchedule>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        now: Instant,
        calendar: CalendarSpec,
        universe: &'a mut UniverseManager,
        orders: &'a mut OrderBook,
        portfolio: &'a Portfolio,
        contracts: &'a dyn ContractLookup,
        schedules: &'a mut Vec<PendingSchedule>,
    ) -> Self {
        Self {
            now,
            calendar,
            universe,
            orders,
            portfolio,
            contracts,
            schedules,
        }
    }

    // -- read-only state ----------------------------------------------------

    pub fn time(&self) -> Instant {
        self.now
    }

    pub fn calendar(&self) -> CalendarSpec {
        self.calendar
    }

    pub fn security(&self, symbol: &Symbol) -> Option<&Security> {
        self.universe.get(symbol)
    }

    pub fn securities(&self) -> impl Iterator<Item = &Security> {
        self.universe.securities()
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.open_orders()
    }

    // -- orders -------------------------------------------------------------

    pub fn buy(&mut self, symbol: &Symbol, quantity: i64) -> Result<Order, OrderError> {
        self.market_order(symbol, quantity.abs())
    }

    pub fn sell(&mut self, symbol: &Symbol, quantity: i64) -> Result<Order, OrderError> {
        self.market_order(symbol, -quantity.abs())
    }

    /// Signed quantity: positive buys, negative sells.
    pub fn market_order(&mut self, symbol: &Symbol, quantity: i64) -> Result<Order, OrderError> {
        self.submit(OrderRequest::market(symbol.clone(), quantity))
    }

    pub fn market_on_open_order(&mut self, symbol: &Symbol, quantity: i64) -> Result<Order, OrderError> {
        self.submit(OrderRequest::market_on_open(symbol.clone(), quantity))
    }

    pub fn submit(&mut self, request: OrderRequest) -> Result<Order, OrderError> {
        let res = self
            .orders
            .submit(request, self.universe, self.portfolio.cash_micros, self.now);
        if let Err(e) = &res {
            warn!(time = %self.now, error = %e, "order command rejected");
        }
        res
    }

    pub fn cancel(&mut self, id: OrderId) -> Result<OrderEvent, OrderError> {
        self.orders.cancel(id, self.now)
    }

    /// Cancel open orders on `symbol` (every symbol when `None`) and flatten
    /// the holdings with market orders.
    pub fn liquidate(&mut self, symbol: Option<&Symbol>) -> Result<Vec<Order>, OrderError> {
        let targets: Vec<(Symbol, i64)> = self
            .portfolio
            .holdings
            .values()
            .filter(|h| symbol.map_or(true, |s| *s == h.symbol))
            .map(|h| (h.symbol.clone(), h.quantity()))
            .collect();

        match symbol {
            Some(s) => {
                self.orders.cancel_open_orders_for(s, self.now);
            }
            None => {
                let open: Vec<OrderId> = self.orders.open_orders().map(|o| o.id).collect();
                for id in open {
                    self.orders.cancel(id, self.now)?;
                }
            }
        }

        let mut out = Vec::new();
        for (sym, qty) in targets {
            if qty != 0 {
                out.push(self.market_order(&sym, -qty)?);
            }
        }
        Ok(out)
    }

    // -- subscriptions ------------------------------------------------------

    pub fn add_instrument(&mut self, symbol: &Symbol) -> Result<(), UniverseError> {
        self.universe.add_instrument(symbol.clone())
    }

    pub fn add_option_contract(&mut self, contract: &Symbol) -> Result<(), UniverseError> {
        self.universe.add_contract(contract.clone())
    }

    /// Unexpired contracts on `underlying` as of the current date, sorted.
    pub fn option_chain(&self, underlying: &Symbol) -> Vec<Symbol> {
        self.contracts.contracts(underlying, self.now.date())
    }

    /// Subscribe the first listed contract on `underlying` with the given
    /// expiry, right and style.
    pub fn add_derived_contract(
        &mut self,
        underlying: &Symbol,
        expiry: NaiveDate,
        right: OptionRight,
        style: OptionStyle,
    ) -> Result<Symbol, UniverseError> {
        let contract = self
            .option_chain(underlying)
            .into_iter()
            .find(|c| {
                c.contract()
                    .is_some_and(|oc| oc.expiry() == expiry && oc.right() == right && oc.style() == style)
            })
            .ok_or_else(|| UniverseError::NoMatchingContract {
                underlying: underlying.clone(),
                expiry,
            })?;
        self.universe.add_contract(contract.clone())?;
        Ok(contract)
    }

    /// Clear the manual subscription and cancel open orders on `symbol`.
    /// Holdings are left untouched; use [`StrategyContext::liquidate`] first
    /// to close them.
    pub fn remove_instrument(&mut self, symbol: &Symbol) -> Result<Vec<OrderEvent>, UniverseError> {
        self.universe.remove_instrument(symbol)?;
        Ok(self.orders.cancel_open_orders_for(symbol, self.now))
    }

    // -- scheduling ---------------------------------------------------------

    pub fn schedule<F>(&mut self, rule: ScheduleRule, callback: F)
    where
        F: FnMut(&mut StrategyContext<'_>) -> StrategyResult + Send + 'static,
    {
        self.schedules.push(PendingSchedule {
            rule,
            action: ScheduledAction::Callback(Box::new(callback)),
            registered: self.now.time(),
        });
    }

    pub fn schedule_named(&mut self, rule: ScheduleRule, name: impl Into<String>) {
        self.schedules.push(PendingSchedule {
            rule,
            action: ScheduledAction::Named(name.into()),
            registered: self.now.time(),
        });
    }
}
