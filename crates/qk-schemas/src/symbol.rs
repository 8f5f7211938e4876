use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    Usa,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Equity,
    Option,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    American,
    European,
}

/// Terms of a listed option on an equity underlying.
///
/// The underlying is stored as an equity ticker, so a contract can never be
/// written on another contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionContract {
    underlying: String,
    market: Market,
    expiry: NaiveDate,
    strike_micros: i64,
    right: OptionRight,
    style: OptionStyle,
}

impl OptionContract {
    pub fn underlying_ticker(&self) -> &str {
        &self.underlying
    }

    pub fn expiry(&self) -> NaiveDate {
        self.expiry
    }

    pub fn strike_micros(&self) -> i64 {
        self.strike_micros
    }

    pub fn right(&self) -> OptionRight {
        self.right
    }

    pub fn style(&self) -> OptionStyle {
        self.style
    }
}

/// Errors raised while constructing or parsing a [`Symbol`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    EmptyTicker,
    InvalidTicker(String),
    /// Derived contracts must be written on an equity.
    UnderlyingNotEquity(String),
    NonPositiveStrike(i64),
    Malformed(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::EmptyTicker => write!(f, "ticker must not be empty"),
            SymbolError::InvalidTicker(t) => write!(f, "invalid ticker: {t:?}"),
            SymbolError::UnderlyingNotEquity(s) => {
                write!(f, "underlying {s} is not an equity")
            }
            SymbolError::NonPositiveStrike(k) => write!(f, "strike must be > 0, got {k} micros"),
            SymbolError::Malformed(s) => write!(f, "malformed symbol: {s:?}"),
        }
    }
}

impl std::error::Error for SymbolError {}

/// Immutable instrument identifier.
///
/// Renders equities as their ticker and options in OCC form, e.g.
/// `AAPL  140621C00650000`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Symbol {
    Equity { ticker: String, market: Market },
    Option(OptionContract),
}

impl Symbol {
    /// Build a US equity symbol. Panics (debug only) on an empty ticker; use
    /// [`Symbol::parse`] for untrusted input.
    pub fn equity(ticker: impl Into<String>) -> Self {
        let ticker = ticker.into();
        debug_assert!(!ticker.trim().is_empty(), "equity ticker must not be empty");
        Symbol::Equity {
            ticker,
            market: Market::Usa,
        }
    }

    /// Build an option contract on `underlying`.
    pub fn option(
        underlying: &Symbol,
        expiry: NaiveDate,
        strike_micros: i64,
        right: OptionRight,
        style: OptionStyle,
    ) -> Result<Self, SymbolError> {
        let (ticker, market) = match underlying {
            Symbol::Equity { ticker, market } => (ticker.clone(), *market),
            Symbol::Option(_) => return Err(SymbolError::UnderlyingNotEquity(underlying.to_string())),
        };
        validate_ticker(&ticker)?;
        if strike_micros <= 0 {
            return Err(SymbolError::NonPositiveStrike(strike_micros));
        }
        Ok(Symbol::Option(OptionContract {
            underlying: ticker,
            market,
            expiry,
            strike_micros,
            right,
            style,
        }))
    }

    /// Parse a ticker or an OCC option identifier. OCC identifiers carry no
    /// exercise style; listed US equity options are American.
    pub fn parse(s: &str) -> Result<Self, SymbolError> {
        let raw = s.trim_end();
        if raw.trim().is_empty() {
            return Err(SymbolError::EmptyTicker);
        }
        if raw.len() == 21 {
            return parse_occ(raw);
        }
        let ticker = raw.trim();
        validate_ticker(ticker)?;
        Ok(Symbol::equity(ticker))
    }

    pub fn security_type(&self) -> SecurityType {
        match self {
            Symbol::Equity { .. } => SecurityType::Equity,
            Symbol::Option(_) => SecurityType::Option,
        }
    }

    pub fn is_derivative(&self) -> bool {
        matches!(self, Symbol::Option(_))
    }

    /// Ticker of the symbol itself, or of the underlying for a contract.
    pub fn ticker(&self) -> &str {
        match self {
            Symbol::Equity { ticker, .. } => ticker,
            Symbol::Option(c) => &c.underlying,
        }
    }

    pub fn market(&self) -> Market {
        match self {
            Symbol::Equity { market, .. } => *market,
            Symbol::Option(c) => c.market,
        }
    }

    /// Underlying equity of a derived contract.
    pub fn underlying(&self) -> Option<Symbol> {
        match self {
            Symbol::Equity { .. } => None,
            Symbol::Option(c) => Some(Symbol::Equity {
                ticker: c.underlying.clone(),
                market: c.market,
            }),
        }
    }

    pub fn contract(&self) -> Option<&OptionContract> {
        match self {
            Symbol::Equity { .. } => None,
            Symbol::Option(c) => Some(c),
        }
    }

    /// Units of the underlying delivered per contract.
    pub fn contract_multiplier(&self) -> i64 {
        match self {
            Symbol::Equity { .. } => 1,
            Symbol::Option(_) => 100,
        }
    }
}

fn validate_ticker(t: &str) -> Result<(), SymbolError> {
    if t.is_empty() {
        return Err(SymbolError::EmptyTicker);
    }
    if t.len() > 6 || !t.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
        return Err(SymbolError::InvalidTicker(t.to_string()));
    }
    Ok(())
}

fn parse_occ(raw: &str) -> Result<Symbol, SymbolError> {
    let malformed = || SymbolError::Malformed(raw.to_string());
    if !raw.is_ascii() {
        return Err(malformed());
    }
    let root = raw[..6].trim_end();
    let date = &raw[6..12];
    let right = &raw[12..13];
    let strike = &raw[13..];

    let expiry = NaiveDate::parse_from_str(&format!("20{date}"), "%Y%m%d").map_err(|_| malformed())?;
    let right = match right {
        "C" => OptionRight::Call,
        "P" => OptionRight::Put,
        _ => return Err(malformed()),
    };
    if !strike.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let strike_thousandths: i64 = strike.parse().map_err(|_| malformed())?;

    Symbol::option(
        &Symbol::parse(root)?,
        expiry,
        strike_thousandths * 1_000,
        right,
        OptionStyle::American,
    )
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Equity { ticker, .. } => f.write_str(ticker),
            Symbol::Option(c) => {
                let right = match c.right {
                    OptionRight::Call => 'C',
                    OptionRight::Put => 'P',
                };
                write!(
                    f,
                    "{:<6}{:02}{:02}{:02}{}{:08}",
                    c.underlying,
                    c.expiry.year() % 100,
                    c.expiry.month(),
                    c.expiry.day(),
                    right,
                    c.strike_micros / 1_000
                )
            }
        }
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Symbol::parse(&s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.to_string()
    }
}
