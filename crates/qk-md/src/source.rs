//! Collaborator boundaries: historical prices and derivative listings.
//!
//! The engine only ever sees these traits; tests and the CLI inject
//! [`InMemoryPriceSource`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use qk_schemas::Symbol;

use crate::types::PricePoint;

/// Historical price collaborator.
pub trait PriceSource: Send + Sync {
    /// Time-sorted series for `symbol`, or `None` when the source has no data.
    fn series(&self, symbol: &Symbol) -> Option<&[PricePoint]>;
}

/// Derivative-contract lookup collaborator.
pub trait ContractLookup: Send + Sync {
    /// Contracts on `underlying` that have not expired as of `date`, sorted.
    fn contracts(&self, underlying: &Symbol, date: NaiveDate) -> Vec<Symbol>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryPriceSource {
    series: BTreeMap<Symbol, Vec<PricePoint>>,
    contracts: BTreeSet<Symbol>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from unordered points. Option symbols with data are listed as
    /// contracts automatically.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut src = Self::new();
        for p in points {
            src.push(p);
        }
        src.sort();
        src
    }

    pub fn insert_point(&mut self, point: PricePoint) {
        self.push(point);
        self.sort();
    }

    /// List a contract without price data.
    pub fn add_contract(&mut self, contract: Symbol) {
        if contract.is_derivative() {
            self.contracts.insert(contract);
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    fn push(&mut self, point: PricePoint) {
        if point.symbol.is_derivative() {
            self.contracts.insert(point.symbol.clone());
        }
        self.series.entry(point.symbol.clone()).or_default().push(point);
    }

    fn sort(&mut self) {
        // Stable: equal timestamps keep insertion order.
        for s in self.series.values_mut() {
            s.sort_by_key(|p| p.time);
        }
    }
}

impl PriceSource for InMemoryPriceSource {
    fn series(&self, symbol: &Symbol) -> Option<&[PricePoint]> {
        self.series.get(symbol).map(Vec::as_slice)
    }
}

impl ContractLookup for InMemoryPriceSource {
    fn contracts(&self, underlying: &Symbol, date: NaiveDate) -> Vec<Symbol> {
        self.contracts
            .iter()
            .filter(|c| c.underlying().as_ref() == Some(underlying))
            .filter(|c| c.contract().is_some_and(|oc| oc.expiry() >= date))
            .cloned()
            .collect()
    }
}
