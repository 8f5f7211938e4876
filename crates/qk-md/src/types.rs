use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use qk_schemas::{DataNormalizationMode, Instant, Symbol, MICROS_SCALE};

/// One historical print for a symbol.
///
/// `open_micros` is the opening price of the print's bar when the source
/// carries one; tick data leaves it empty. `factor_micros` is the cumulative
/// adjustment factor (1.0 = `MICROS_SCALE`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricePoint {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub price_micros: i64,
    pub open_micros: Option<i64>,
    pub factor_micros: i64,
}

impl PricePoint {
    pub fn new(symbol: Symbol, time: NaiveDateTime, price_micros: i64) -> Self {
        Self {
            symbol,
            time,
            price_micros,
            open_micros: None,
            factor_micros: MICROS_SCALE,
        }
    }

    pub fn with_open(mut self, open_micros: i64) -> Self {
        self.open_micros = Some(open_micros);
        self
    }

    pub fn with_factor(mut self, factor_micros: i64) -> Self {
        self.factor_micros = factor_micros;
        self
    }

    pub fn price(&self, mode: DataNormalizationMode) -> i64 {
        self.normalize(self.price_micros, mode)
    }

    /// Opening price of this print, falling back to the print price.
    pub fn open(&self, mode: DataNormalizationMode) -> i64 {
        self.normalize(self.open_micros.unwrap_or(self.price_micros), mode)
    }

    fn normalize(&self, micros: i64, mode: DataNormalizationMode) -> i64 {
        match mode {
            DataNormalizationMode::Raw => micros,
            DataNormalizationMode::Adjusted => {
                let v = (micros as i128) * (self.factor_micros as i128) / (MICROS_SCALE as i128);
                v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
            }
        }
    }
}

/// Opening print of one trading session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOpen {
    pub date: NaiveDate,
    pub time: NaiveDateTime,
    pub open_micros: i64,
}

/// Latest known state of a symbol as of a slice instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    /// Time of the print the price comes from (at or before the slice instant).
    pub time: NaiveDateTime,
    pub price_micros: i64,
    /// Opening print of the most recent session observed so far.
    pub session_open: Option<SessionOpen>,
}

/// Symbol -> latest quote for every tracked symbol that has data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSlice {
    instant: Instant,
    quotes: BTreeMap<Symbol, Quote>,
}

impl DataSlice {
    pub fn new(instant: Instant) -> Self {
        Self {
            instant,
            quotes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, symbol: Symbol, quote: Quote) {
        self.quotes.insert(symbol, quote);
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn price(&self, symbol: &Symbol) -> Option<i64> {
        self.quotes.get(symbol).map(|q| q.price_micros)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.quotes.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.quotes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Quote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_price_scales_by_factor() {
        let t = NaiveDate::from_ymd_opt(2014, 6, 5)
            .unwrap()
            .and_hms_opt(9, 31, 0)
            .unwrap();
        let p = PricePoint::new(Symbol::equity("AAPL"), t, 645_000_000).with_factor(142_857);
        assert_eq!(p.price(DataNormalizationMode::Raw), 645_000_000);
        // 645 * 0.142857 = 92.142765
        assert_eq!(p.price(DataNormalizationMode::Adjusted), 92_142_765);
        assert_eq!(p.open(DataNormalizationMode::Raw), 645_000_000);
    }
}
