//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{BuyerId, CartLineId, OptionId, ProductId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    LineAdded(LineAddedData),

    LineQuantityChanged(LineQuantityChangedData),

    LineRemoved(LineRemovedData),

    /// All lines were turned into an order.
    CartCleared(CartClearedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::LineAdded(_) => "CartLineAdded",
            CartEvent::LineQuantityChanged(_) => "CartLineQuantityChanged",
            CartEvent::LineRemoved(_) => "CartLineRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAddedData {
    pub cart_id: AggregateId,
    pub buyer_id: BuyerId,
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub option_id: Option<OptionId>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub line_id: CartLineId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub line_id: CartLineId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    /// Order the lines went into.
    pub order_id: AggregateId,
    pub cleared_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn line_added(
        cart_id: AggregateId,
        buyer_id: BuyerId,
        product_id: ProductId,
        option_id: Option<OptionId>,
        quantity: u32,
    ) -> Self {
        CartEvent::LineAdded(LineAddedData {
            cart_id,
            buyer_id,
            line_id: CartLineId::new(),
            product_id,
            option_id,
            quantity,
            added_at: Utc::now(),
        })
    }

    pub fn line_quantity_changed(line_id: CartLineId, old_quantity: u32, new_quantity: u32) -> Self {
        CartEvent::LineQuantityChanged(LineQuantityChangedData {
            line_id,
            old_quantity,
            new_quantity,
            changed_at: Utc::now(),
        })
    }

    pub fn line_removed(line_id: CartLineId) -> Self {
        CartEvent::LineRemoved(LineRemovedData {
            line_id,
            removed_at: Utc::now(),
        })
    }

    pub fn cart_cleared(order_id: AggregateId) -> Self {
        CartEvent::CartCleared(CartClearedData {
            order_id,
            cleared_at: Utc::now(),
        })
    }
}
