use std::collections::BTreeMap;

use qk_schemas::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Change {
    Added,
    Removed,
}

/// Added/removed symbols produced by one universe resolution.
///
/// Stored as one entry per symbol, so a symbol is never both added and
/// removed in the same value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityChanges {
    entries: BTreeMap<Symbol, Change>,
}

impl SecurityChanges {
    pub fn none() -> Self {
        Self::default()
    }

    /// A symbol listed on both sides ends up removed.
    pub fn new(added: impl IntoIterator<Item = Symbol>, removed: impl IntoIterator<Item = Symbol>) -> Self {
        let mut entries = BTreeMap::new();
        for s in added {
            entries.insert(s, Change::Added);
        }
        for s in removed {
            entries.insert(s, Change::Removed);
        }
        Self { entries }
    }

    /// Accumulate `later` on top of `earlier`: per symbol the later entry
    /// wins, symbols present on one side only carry over. Associative.
    pub fn merge(earlier: &SecurityChanges, later: &SecurityChanges) -> SecurityChanges {
        let mut entries = earlier.entries.clone();
        entries.extend(later.entries.iter().map(|(s, c)| (s.clone(), *c)));
        SecurityChanges { entries }
    }

    /// In-place `merge(self, later)`.
    pub fn absorb(&mut self, later: &SecurityChanges) {
        self.entries
            .extend(later.entries.iter().map(|(s, c)| (s.clone(), *c)));
    }

    pub fn added(&self) -> impl Iterator<Item = &Symbol> {
        self.with(Change::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &Symbol> {
        self.with(Change::Removed)
    }

    pub fn is_added(&self, symbol: &Symbol) -> bool {
        self.entries.get(symbol) == Some(&Change::Added)
    }

    pub fn is_removed(&self, symbol: &Symbol) -> bool {
        self.entries.get(symbol) == Some(&Change::Removed)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn with(&self, kind: Change) -> impl Iterator<Item = &Symbol> {
        self.entries
            .iter()
            .filter(move |(_, c)| **c == kind)
            .map(|(s, _)| s)
    }
}
