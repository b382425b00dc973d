//! Value objects frozen into a placed order.

use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductOption};
use crate::inventory::StockKey;
use crate::value_objects::{Money, OptionId, ProductId, SellerId};

use super::OrderError;

/// Where and to whom the order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeliveryInfo {
    pub fn validate(&self) -> Result<(), OrderError> {
        let missing = [
            ("recipient_name", &self.recipient_name),
            ("recipient_phone", &self.recipient_phone),
            ("address", &self.address),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => Err(OrderError::InvalidDelivery { field }),
            None => Ok(()),
        }
    }
}

/// The option as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub option_id: OptionId,
    pub label: String,
    pub additional_price: Money,
}

/// One line of a placed order. Never changes after placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub seller_id: SellerId,
    pub option: Option<OptionSnapshot>,
    pub quantity: u32,
    /// Discounted product price plus option surcharge at placement time.
    pub unit_price: Money,
}

impl OrderLine {
    /// Freezes the current catalog data for `quantity` units.
    pub fn snapshot(product: &Product, option: Option<&ProductOption>, quantity: u32) -> Self {
        let surcharge = option.map(|o| o.additional_price).unwrap_or_default();
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            seller_id: product.seller_id,
            option: option.map(|o| OptionSnapshot {
                option_id: o.id.clone(),
                label: o.label(),
                additional_price: o.additional_price,
            }),
            quantity,
            unit_price: product.discounted_price() + surcharge,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Stock counter this line reserved from.
    pub fn stock_key(&self) -> StockKey {
        StockKey::for_line(
            &self.product_id,
            self.option.as_ref().map(|o| &o.option_id),
        )
    }
}
