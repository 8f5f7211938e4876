use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use qk_schemas::Symbol;

/// Run-time record for one tracked symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Security {
    symbol: Symbol,
    price_micros: Option<i64>,
    last_update: Option<NaiveDateTime>,
    pub(crate) active: bool,
    pub(crate) manual: bool,
    /// Derived contracts keeping this symbol subscribed.
    pub(crate) dependents: BTreeSet<Symbol>,
    /// Remaining resolutions a released underlying stays subscribed.
    pub(crate) hold_steps: u32,
}

impl Security {
    pub(crate) fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            price_micros: None,
            last_update: None,
            active: false,
            manual: false,
            dependents: BTreeSet::new(),
            hold_steps: 0,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Last known price, `None` until the first print arrives.
    pub fn price_micros(&self) -> Option<i64> {
        self.price_micros
    }

    pub fn last_update(&self) -> Option<NaiveDateTime> {
        self.last_update
    }

    pub fn has_data(&self) -> bool {
        self.price_micros.is_some_and(|p| p != 0)
    }

    /// Selected by the universe at the last resolution.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Receiving data regardless of universe selection.
    pub fn is_subscribed(&self) -> bool {
        self.manual || !self.dependents.is_empty() || self.hold_steps > 0
    }

    pub fn is_member(&self) -> bool {
        self.active || self.is_subscribed()
    }

    pub(crate) fn set_price(&mut self, price_micros: i64, at: NaiveDateTime) {
        self.price_micros = Some(price_micros);
        self.last_update = Some(at);
    }
}
