use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use qk_md::DataSlice;
use qk_schemas::{Instant, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::changes::SecurityChanges;
use crate::security::Security;
use crate::selector::UniverseSelector;

/// What happens to an underlying when the last derived contract holding it
/// is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderlyingRelease {
    /// Released together with the contract.
    #[default]
    WithContract,
    /// Kept subscribed for `n` more resolutions.
    AfterSteps(u32),
    /// Turned into a manual subscription.
    Retain,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCadence {
    #[default]
    EveryStep,
    /// First step of each calendar date; later steps reuse that selection.
    Daily,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UniverseError {
    UnknownSymbol(Symbol),
    NotDerivative(Symbol),
    NoMatchingContract { underlying: Symbol, expiry: NaiveDate },
}

impl fmt::Display for UniverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseError::UnknownSymbol(s) => write!(f, "unknown symbol: {s}"),
            UniverseError::NotDerivative(s) => write!(f, "{s} is not a derived contract"),
            UniverseError::NoMatchingContract { underlying, expiry } => {
                write!(f, "no contract on {underlying} matches expiry {expiry}")
            }
        }
    }
}

impl std::error::Error for UniverseError {}

/// Owns the security registry and the announced membership.
#[derive(Debug, Default)]
pub struct UniverseManager {
    securities: BTreeMap<Symbol, Security>,
    announced: BTreeSet<Symbol>,
    release: UnderlyingRelease,
    cadence: SelectionCadence,
    day_selection: Option<(NaiveDate, BTreeSet<Symbol>)>,
}

impl UniverseManager {
    pub fn new(release: UnderlyingRelease, cadence: SelectionCadence) -> Self {
        Self {
            release,
            cadence,
            ..Self::default()
        }
    }

    /// Run the selector and diff membership against the last announcement.
    pub fn resolve(&mut self, instant: &Instant, selector: &mut dyn UniverseSelector) -> SecurityChanges {
        let selected = self.selection(instant, selector);

        for s in &selected {
            self.securities
                .entry(s.clone())
                .or_insert_with(|| Security::new(s.clone()));
        }
        for (sym, sec) in self.securities.iter_mut() {
            sec.active = selected.contains(sym);
        }

        let members: BTreeSet<Symbol> = self
            .securities
            .values()
            .filter(|s| s.is_member())
            .map(|s| s.symbol().clone())
            .collect();

        for sec in self.securities.values_mut() {
            sec.hold_steps = sec.hold_steps.saturating_sub(1);
        }

        let added = members.difference(&self.announced).cloned();
        let removed = self.announced.difference(&members).cloned();
        let changes = SecurityChanges::new(added, removed);
        self.announced = members;

        if !changes.is_empty() {
            debug!(
                time = %instant,
                added = changes.added().count(),
                removed = changes.removed().count(),
                "universe changed"
            );
        }
        changes
    }

    fn selection(&mut self, instant: &Instant, selector: &mut dyn UniverseSelector) -> BTreeSet<Symbol> {
        match self.cadence {
            SelectionCadence::EveryStep => selector.select(instant).into_iter().collect(),
            SelectionCadence::Daily => {
                let today = instant.date();
                if let Some((day, sel)) = &self.day_selection {
                    if *day == today {
                        return sel.clone();
                    }
                }
                let sel: BTreeSet<Symbol> = selector.select(instant).into_iter().collect();
                self.day_selection = Some((today, sel.clone()));
                sel
            }
        }
    }

    /// Manually subscribe `symbol`. Derived contracts go through
    /// [`UniverseManager::add_contract`].
    pub fn add_instrument(&mut self, symbol: Symbol) -> Result<(), UniverseError> {
        if symbol.is_derivative() {
            return self.add_contract(symbol);
        }
        let sec = self.entry(&symbol);
        sec.manual = true;
        sec.hold_steps = 0;
        Ok(())
    }

    /// Manually subscribe a derived contract; its underlying stays
    /// subscribed for as long as the contract is.
    pub fn add_contract(&mut self, contract: Symbol) -> Result<(), UniverseError> {
        let underlying = contract
            .underlying()
            .ok_or_else(|| UniverseError::NotDerivative(contract.clone()))?;
        self.entry(&contract).manual = true;
        let u = self.entry(&underlying);
        u.dependents.insert(contract);
        u.hold_steps = 0;
        Ok(())
    }

    /// Clear the manual subscription. A record no longer selected or held
    /// by a dependent is dropped; its removal is announced at the next
    /// resolution.
    pub fn remove_instrument(&mut self, symbol: &Symbol) -> Result<(), UniverseError> {
        let sec = self
            .securities
            .get_mut(symbol)
            .ok_or_else(|| UniverseError::UnknownSymbol(symbol.clone()))?;
        sec.manual = false;
        sec.hold_steps = 0;
        if !sec.is_member() {
            self.securities.remove(symbol);
        }

        if let Some(underlying) = symbol.underlying() {
            self.release_underlying(&underlying, symbol);
        }
        debug!(symbol = %symbol, "instrument removed");
        Ok(())
    }

    fn release_underlying(&mut self, underlying: &Symbol, contract: &Symbol) {
        let policy = self.release;
        let Some(u) = self.securities.get_mut(underlying) else {
            return;
        };
        if !u.dependents.remove(contract) || !u.dependents.is_empty() || u.manual {
            return;
        }
        match policy {
            UnderlyingRelease::WithContract => {}
            UnderlyingRelease::AfterSteps(n) => u.hold_steps = n,
            UnderlyingRelease::Retain => u.manual = true,
        }
    }

    pub fn update_prices(&mut self, slice: &DataSlice) {
        for (sym, q) in slice.iter() {
            if let Some(sec) = self.securities.get_mut(sym) {
                sec.set_price(q.price_micros, q.time);
            }
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Security> {
        self.securities.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.securities.contains_key(symbol)
    }

    pub fn securities(&self) -> impl Iterator<Item = &Security> {
        self.securities.values()
    }

    /// Symbols that receive data: the membership last announced.
    pub fn data_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.announced.iter()
    }

    pub fn release_policy(&self) -> UnderlyingRelease {
        self.release
    }

    fn entry(&mut self, symbol: &Symbol) -> &mut Security {
        self.securities
            .entry(symbol.clone())
            .or_insert_with(|| Security::new(symbol.clone()))
    }
}
