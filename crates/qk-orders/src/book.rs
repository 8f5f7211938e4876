use std::collections::BTreeMap;

use qk_clock::CalendarSpec;
use qk_md::DataSlice;
use qk_schemas::{format_micros, Instant, Symbol};
use qk_universe::UniverseManager;
use tracing::{debug, warn};

use crate::error::OrderError;
use crate::types::{BuyingPowerPolicy, Order, OrderEvent, OrderId, OrderRequest, OrderStatus, OrderType};

/// Owns every order of a run and the queue of undelivered events.
#[derive(Debug)]
pub struct OrderBook {
    calendar: CalendarSpec,
    policy: BuyingPowerPolicy,
    orders: BTreeMap<OrderId, Order>,
    next_id: u64,
    next_seq: u64,
    pending: Vec<OrderEvent>,
    warnings: Vec<String>,
}

impl OrderBook {
    pub fn new(calendar: CalendarSpec, policy: BuyingPowerPolicy) -> Self {
        Self {
            calendar,
            policy,
            orders: BTreeMap::new(),
            next_id: 1,
            next_seq: 0,
            pending: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Validate and accept an order at `now`.
    pub fn submit(
        &mut self,
        request: OrderRequest,
        securities: &UniverseManager,
        cash_micros: i64,
        now: Instant,
    ) -> Result<Order, OrderError> {
        let security = securities
            .get(&request.symbol)
            .ok_or_else(|| OrderError::UnknownSymbol(request.symbol.clone()))?;
        if request.quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }

        if request.quantity > 0 {
            let px = security.price_micros().unwrap_or(0);
            let required = (request.quantity as i128) * (px as i128) * (request.symbol.contract_multiplier() as i128);
            let required = required.clamp(0, i64::MAX as i128) as i64;
            if required > cash_micros {
                match self.policy {
                    BuyingPowerPolicy::Enforce => {
                        warn!(symbol = %request.symbol, qty = request.quantity, "order rejected: insufficient funds");
                        return Err(OrderError::InsufficientFunds {
                            required_micros: required,
                            available_micros: cash_micros,
                        });
                    }
                    BuyingPowerPolicy::WarnOnly => {
                        let msg = format!(
                            "{now}: buy {} {} needs {} but only {} cash is available",
                            request.quantity,
                            request.symbol,
                            format_micros(required),
                            format_micros(cash_micros)
                        );
                        warn!("{msg}");
                        self.warnings.push(msg);
                    }
                }
            }
        }

        let id = OrderId(self.next_id);
        self.next_id += 1;
        let order = Order {
            id,
            symbol: request.symbol,
            quantity: request.quantity,
            order_type: request.order_type,
            submitted: now,
            status: OrderStatus::Submitted,
            fill_price_micros: None,
            fill_time: None,
            tag: request.tag,
        };
        self.orders.insert(id, order.clone());
        self.queue_event(&order, now);
        debug!(order = %id, symbol = %order.symbol, qty = order.quantity, "order submitted");
        Ok(order)
    }

    pub fn cancel(&mut self, id: OrderId, now: Instant) -> Result<OrderEvent, OrderError> {
        let order = self.orders.get_mut(&id).ok_or(OrderError::UnknownOrder(id))?;
        order.transition(OrderStatus::Canceled)?;
        let order = order.clone();
        Ok(self.queue_event(&order, now))
    }

    /// Cancel every open order on `symbol`.
    pub fn cancel_open_orders_for(&mut self, symbol: &Symbol, now: Instant) -> Vec<OrderEvent> {
        let ids: Vec<OrderId> = self
            .open_orders()
            .filter(|o| &o.symbol == symbol)
            .map(|o| o.id)
            .collect();
        ids.into_iter().filter_map(|id| self.cancel(id, now).ok()).collect()
    }

    /// Match open orders submitted strictly before `now` against `slice`.
    /// Returns the fill events in order-id order; they are also queued.
    ///
    /// A market order needs a print at or after its submission time; a
    /// carried-forward quote from earlier never fills it. `fill_time` is the
    /// time of the print the fill price came from.
    pub fn evaluate(&mut self, now: Instant, slice: &DataSlice) -> Vec<OrderEvent> {
        let mut fills = Vec::new();
        let candidates: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| !o.status.is_terminal() && o.submitted < now)
            .map(|o| o.id)
            .collect();

        for id in candidates {
            let Some(order) = self.orders.get_mut(&id) else {
                continue;
            };
            let Some(quote) = slice.get(&order.symbol) else {
                continue;
            };
            let fill = match order.order_type {
                OrderType::Market => {
                    (quote.time >= order.submitted.time()).then_some((quote.price_micros, quote.time))
                }
                OrderType::MarketOnOpen => {
                    let due = self.calendar.next_session_open_after(order.submitted.date());
                    match (due, quote.session_open) {
                        (Some(due), Some(open)) if open.time >= due => Some((open.open_micros, open.time)),
                        _ => None,
                    }
                }
            };
            let Some((price, fill_time)) = fill else {
                continue;
            };
            if order.transition(OrderStatus::Filled).is_err() {
                continue;
            }
            order.fill_price_micros = Some(price);
            order.fill_time = Some(fill_time);
            let order = order.clone();
            debug!(
                order = %order.id,
                symbol = %order.symbol,
                qty = order.quantity,
                price = %format_micros(price),
                "order filled"
            );
            fills.push(self.queue_event(&order, now));
        }
        fills
    }

    /// Undelivered events, oldest submission first, then order id, then
    /// creation sequence.
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        let mut out = std::mem::take(&mut self.pending);
        out.sort_by(|a, b| {
            a.submitted
                .cmp(&b.submitted)
                .then_with(|| a.order_id.cmp(&b.order_id))
                .then_with(|| a.seq.cmp(&b.seq))
        });
        out
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| !o.status.is_terminal())
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn queue_event(&mut self, order: &Order, now: Instant) -> OrderEvent {
        let ev = OrderEvent {
            order_id: order.id,
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            status: order.status,
            submitted: order.submitted,
            time: now.time(),
            fill_price_micros: order.fill_price_micros,
            fill_time: order.fill_time,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.pending.push(ev.clone());
        ev
    }
}
