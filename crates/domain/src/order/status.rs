//! Order status state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fulfilment status of an order.
///
/// ```text
/// PENDING ──► CONFIRMED ──► PREPARING ──► SHIPPED ──► DELIVERED
///    │            │             │
///    └────────────┴─────────────┴──► CANCELLED
/// ```
///
/// Administrative moves go forward only and may skip steps. `CANCELLED` and
/// `DELIVERED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order cannot be cancelled once {from}")]
    CannotCancel { from: OrderStatus },

    #[error("Order cannot be updated once {from}")]
    CannotUpdate { from: OrderStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl OrderStatus {
    /// Checks that `self -> target` is legal and returns `target` if it is.
    ///
    /// This is the only place transition rules are decided.
    pub fn transition(self, target: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self == OrderStatus::Cancelled {
            return Err(TransitionError::AlreadyCancelled);
        }

        if target == OrderStatus::Cancelled {
            return match self {
                OrderStatus::Shipped | OrderStatus::Delivered => {
                    Err(TransitionError::CannotCancel { from: self })
                }
                _ => Ok(OrderStatus::Cancelled),
            };
        }

        if self == OrderStatus::Delivered {
            return Err(TransitionError::CannotUpdate { from: self });
        }

        if target.rank() <= self.rank() {
            return Err(TransitionError::InvalidTransition {
                from: self,
                to: target,
            });
        }

        Ok(target)
    }

    pub fn can_cancel(&self) -> bool {
        self.transition(OrderStatus::Cancelled).is_ok()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Still moving through fulfilment (neither delivered nor cancelled).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Preparing => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Human readable label shown to buyers and sellers.
    pub fn description(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting confirmation",
            OrderStatus::Confirmed => "Order confirmed",
            OrderStatus::Preparing => "Preparing for shipment",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}
