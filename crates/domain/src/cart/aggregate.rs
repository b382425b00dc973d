//! Cart aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::inventory::StockKey;
use crate::value_objects::{BuyerId, CartLineId, OptionId, ProductId};

use super::{CartError, CartEvent};

/// One (product, option) entry of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub option_id: Option<OptionId>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn stock_key(&self) -> StockKey {
        StockKey::for_line(&self.product_id, self.option_id.as_ref())
    }
}

/// A buyer's cart. One per buyer, created by the first add.
///
/// Lines keep insertion order; checkout walks them in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    buyer_id: Option<BuyerId>,

    lines: Vec<CartLine>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::LineAdded(data) => {
                self.id.get_or_insert(data.cart_id);
                self.buyer_id.get_or_insert(data.buyer_id);
                self.lines.push(CartLine {
                    line_id: data.line_id,
                    product_id: data.product_id,
                    option_id: data.option_id,
                    quantity: data.quantity,
                    added_at: data.added_at,
                });
            }
            CartEvent::LineQuantityChanged(data) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_id == data.line_id) {
                    line.quantity = data.new_quantity;
                }
            }
            CartEvent::LineRemoved(data) => {
                self.lines.retain(|l| l.line_id != data.line_id);
            }
            CartEvent::CartCleared(_) => {
                self.lines.clear();
            }
        }
    }
}

// Query methods
impl Cart {
    /// Stream id of `buyer_id`'s cart.
    pub fn stream_id(buyer_id: BuyerId) -> AggregateId {
        AggregateId::derived("cart", &buyer_id.to_string())
    }

    pub fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, line_id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn find_line(&self, product_id: &ProductId, option_id: Option<&OptionId>) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|l| &l.product_id == product_id && l.option_id.as_ref() == option_id)
    }
}

// Command methods
impl Cart {
    /// Adds `quantity` of a product/option, merging into an existing line
    /// for the same combination. `available` is the current stock of the
    /// line's stock key; the resulting quantity may not exceed it.
    pub fn add_line(
        &self,
        buyer_id: BuyerId,
        product_id: ProductId,
        option_id: Option<OptionId>,
        quantity: u32,
        available: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        match self.find_line(&product_id, option_id.as_ref()) {
            Some(existing) => {
                let requested = existing.quantity.saturating_add(quantity);
                if requested > available {
                    return Err(CartError::ExceedsStock {
                        requested,
                        available,
                    });
                }
                Ok(vec![CartEvent::line_quantity_changed(
                    existing.line_id,
                    existing.quantity,
                    requested,
                )])
            }
            None => {
                if quantity > available {
                    return Err(CartError::ExceedsStock {
                        requested: quantity,
                        available,
                    });
                }
                let cart_id = self.id.unwrap_or_else(|| Self::stream_id(buyer_id));
                Ok(vec![CartEvent::line_added(
                    cart_id, buyer_id, product_id, option_id, quantity,
                )])
            }
        }
    }

    /// Replaces a line's quantity. Setting the current value is a no-op.
    pub fn set_quantity(
        &self,
        line_id: CartLineId,
        quantity: u32,
        available: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let line = self
            .line(line_id)
            .ok_or(CartError::LineNotFound { line_id })?;

        if quantity == line.quantity {
            return Ok(vec![]);
        }

        if quantity > available {
            return Err(CartError::ExceedsStock {
                requested: quantity,
                available,
            });
        }

        Ok(vec![CartEvent::line_quantity_changed(
            line_id,
            line.quantity,
            quantity,
        )])
    }

    pub fn remove_line(&self, line_id: CartLineId) -> Result<Vec<CartEvent>, CartError> {
        if self.line(line_id).is_none() {
            return Err(CartError::LineNotFound { line_id });
        }

        Ok(vec![CartEvent::line_removed(line_id)])
    }

    /// Empties the cart after its lines became `order_id`.
    pub fn clear(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.is_empty() {
            return Err(CartError::Empty);
        }

        Ok(vec![CartEvent::cart_cleared(order_id)])
    }
}
