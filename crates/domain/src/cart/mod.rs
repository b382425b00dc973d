//! Buyer carts.

mod aggregate;
mod events;

pub use aggregate::{Cart, CartLine};
pub use events::{
    CartClearedData, CartEvent, LineAddedData, LineQuantityChangedData, LineRemovedData,
};

use thiserror::Error;

use crate::value_objects::CartLineId;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Requested quantity {requested} exceeds available stock {available}")]
    ExceedsStock { requested: u32, available: u32 },

    #[error("Cart line not found: {line_id}")]
    LineNotFound { line_id: CartLineId },

    #[error("Cart is empty")]
    Empty,
}
