use std::fmt;

use chrono::NaiveDateTime;
use qk_schemas::{Instant, Symbol};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Order ids are assigned sequentially from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    /// Fills at the opening print of the next trading session.
    MarketOnOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
        }
    }
}

/// How a buy that exceeds available cash is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingPowerPolicy {
    /// Reject with `InsufficientFunds`.
    #[default]
    Enforce,
    /// Accept, record a warning.
    WarnOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: Symbol,
    /// Signed: positive buys, negative sells.
    pub quantity: i64,
    pub order_type: OrderType,
    pub tag: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: Symbol, quantity: i64) -> Self {
        Self {
            symbol,
            quantity,
            order_type: OrderType::Market,
            tag: None,
        }
    }

    pub fn market_on_open(symbol: Symbol, quantity: i64) -> Self {
        Self {
            symbol,
            quantity,
            order_type: OrderType::MarketOnOpen,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub quantity: i64,
    pub order_type: OrderType,
    pub submitted: Instant,
    pub status: OrderStatus,
    pub fill_price_micros: Option<i64>,
    pub fill_time: Option<NaiveDateTime>,
    pub tag: Option<String>,
}

impl Order {
    /// Legal transitions: `Submitted -> Filled | Canceled`.
    pub(crate) fn transition(&mut self, to: OrderStatus) -> Result<(), TransitionError> {
        if self.status != OrderStatus::Submitted || to == OrderStatus::Submitted {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Immutable record of one order status change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub quantity: i64,
    pub status: OrderStatus,
    pub submitted: Instant,
    pub time: NaiveDateTime,
    pub fill_price_micros: Option<i64>,
    pub fill_time: Option<NaiveDateTime>,
    /// Creation sequence, unique per book.
    pub seq: u64,
}

impl OrderEvent {
    pub fn is_fill(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_name_matches_as_str() {
        for s in [OrderStatus::Submitted, OrderStatus::Filled, OrderStatus::Canceled] {
            assert_eq!(serde_json::to_value(s).unwrap(), serde_json::json!(s.as_str()));
        }
    }

    #[test]
    fn buying_power_policy_config_names() {
        let p: BuyingPowerPolicy = serde_json::from_str("\"warn_only\"").unwrap();
        assert_eq!(p, BuyingPowerPolicy::WarnOnly);
        assert!(serde_json::from_str::<BuyingPowerPolicy>("\"lenient\"").is_err());
    }
}
