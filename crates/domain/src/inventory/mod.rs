//! Stock counters for products and product options.

mod aggregate;
mod events;

pub use aggregate::Stock;
pub use events::{StockEvent, StockReceivedData, StockReleasedData, StockReservedData};

use std::fmt;

use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_objects::{OptionId, ProductId};

/// The unit of stock tracking.
///
/// A line that names an option draws on the option's counter; the product's
/// own counter is left alone. A line without an option draws on the product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockKey {
    Product(ProductId),
    Option(OptionId),
}

impl StockKey {
    pub fn for_line(product_id: &ProductId, option_id: Option<&OptionId>) -> Self {
        match option_id {
            Some(option_id) => StockKey::Option(option_id.clone()),
            None => StockKey::Product(product_id.clone()),
        }
    }

    /// Deterministic stream id of this key's `Stock` aggregate.
    pub fn stream_id(&self) -> AggregateId {
        AggregateId::derived("stock", &self.to_string())
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockKey::Product(id) => write!(f, "product:{id}"),
            StockKey::Option(id) => write!(f, "option:{id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StockError {
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Out of stock: {key} (requested {requested}, available {available})")]
    OutOfStock {
        key: StockKey,
        requested: u32,
        available: u32,
    },

    #[error("Stock counter overflow for {key}")]
    Overflow { key: StockKey },

    #[error("Cannot release {requested} of {key}: only {reserved} reserved")]
    ReleaseExceedsReserved {
        key: StockKey,
        requested: u32,
        reserved: u32,
    },
}
