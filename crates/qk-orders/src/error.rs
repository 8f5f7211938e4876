use std::fmt;

use qk_schemas::{format_micros, Symbol};

use crate::types::{OrderId, OrderStatus};

/// Command rejections returned to the strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderError {
    UnknownSymbol(Symbol),
    ZeroQuantity,
    InsufficientFunds { required_micros: i64, available_micros: i64 },
    InvalidState { id: OrderId, status: OrderStatus },
    UnknownOrder(OrderId),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::UnknownSymbol(s) => write!(f, "no security record for {s}"),
            OrderError::ZeroQuantity => write!(f, "order quantity must be non-zero"),
            OrderError::InsufficientFunds {
                required_micros,
                available_micros,
            } => write!(
                f,
                "insufficient funds: required {}, available {}",
                format_micros(*required_micros),
                format_micros(*available_micros)
            ),
            OrderError::InvalidState { id, status } => {
                write!(f, "order {id} is already {}", status.as_str())
            }
            OrderError::UnknownOrder(id) => write!(f, "unknown order id {id}"),
        }
    }
}

impl std::error::Error for OrderError {}

/// An illegal status change was attempted on an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionError {
    pub id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal order transition for {}: {:?} -> {:?}", self.id, self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for OrderError {
    fn from(e: TransitionError) -> Self {
        OrderError::InvalidState {
            id: e.id,
            status: e.from,
        }
    }
}
