use qk_schemas::{Instant, Symbol};

/// Universe selection function supplied at configuration time.
pub trait UniverseSelector: Send {
    /// Symbols in the universe at `instant`. Order and duplicates are
    /// irrelevant.
    fn select(&mut self, instant: &Instant) -> Vec<Symbol>;

    /// `true` when the selector can never return anything.
    fn is_empty(&self) -> bool {
        false
    }
}

impl<F> UniverseSelector for F
where
    F: FnMut(&Instant) -> Vec<Symbol> + Send,
{
    fn select(&mut self, instant: &Instant) -> Vec<Symbol> {
        self(instant)
    }
}

/// Fixed list of symbols for every step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticUniverse {
    symbols: Vec<Symbol>,
}

impl StaticUniverse {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }
}

impl UniverseSelector for StaticUniverse {
    fn select(&mut self, _instant: &Instant) -> Vec<Symbol> {
        self.symbols.clone()
    }

    fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
