//! Read access to product listings.
//!
//! Product administration lives outside this engine; checkout only needs
//! current prices, seller ownership and option metadata. Stock is not part of
//! a listing: it is tracked by the [`Stock`](crate::inventory::Stock) aggregate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::DomainError;
use crate::value_objects::{Money, OptionId, ProductId, SellerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub seller_id: SellerId,
    /// List price before discount.
    pub price: Money,
    /// Percentage discount, 0..=100.
    #[serde(default)]
    pub discount_rate: u8,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

impl Product {
    /// Price a buyer pays for the base product right now.
    pub fn discounted_price(&self) -> Money {
        self.price.discounted(self.discount_rate)
    }

    pub fn option(&self, option_id: &OptionId) -> Option<&ProductOption> {
        self.options.iter().find(|o| &o.id == option_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: OptionId,
    pub product_id: ProductId,
    /// e.g. "size"
    pub option_type: String,
    /// e.g. "XL"
    pub option_value: String,
    #[serde(default)]
    pub additional_price: Money,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductOption {
    pub fn label(&self) -> String {
        format!("{}: {}", self.option_type, self.option_value)
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError>;

    async fn find_option(&self, option_id: &OptionId) -> Result<Option<ProductOption>, DomainError>;
}

/// Catalog kept in memory; seeded by tests and the HTTP admin routes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a listing.
    pub async fn upsert_product(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    /// Changes list price and discount. Returns false if the product is unknown.
    pub async fn reprice(&self, product_id: &ProductId, price: Money, discount_rate: u8) -> bool {
        match self.products.write().await.get_mut(product_id) {
            Some(product) => {
                product.price = price;
                product.discount_rate = discount_rate.min(100);
                true
            }
            None => false,
        }
    }

    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn find_option(&self, option_id: &OptionId) -> Result<Option<ProductOption>, DomainError> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .flat_map(|p| p.options.iter())
            .find(|o| &o.id == option_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tshirt() -> Product {
        Product {
            id: ProductId::new("P-1"),
            name: "T-shirt".to_string(),
            seller_id: SellerId::new(),
            price: Money::new(20_000),
            discount_rate: 10,
            options: vec![ProductOption {
                id: OptionId::new("OPT-XL"),
                product_id: ProductId::new("P-1"),
                option_type: "size".to_string(),
                option_value: "XL".to_string(),
                additional_price: Money::new(2_000),
                display_order: 1,
                active: true,
            }],
        }
    }

    #[test]
    fn discounted_price_applies_rate() {
        assert_eq!(tshirt().discounted_price(), Money::new(18_000));
    }

    #[test]
    fn option_label_joins_type_and_value() {
        let product = tshirt();
        let option = product.option(&OptionId::new("OPT-XL")).unwrap();
        assert_eq!(option.label(), "size: XL");
    }

    #[tokio::test]
    async fn find_option_searches_all_products() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(tshirt()).await;

        let option = catalog
            .find_option(&OptionId::new("OPT-XL"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(option.product_id, ProductId::new("P-1"));
        assert!(
            catalog
                .find_option(&OptionId::new("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn reprice_updates_listing() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(tshirt()).await;

        assert!(
            catalog
                .reprice(&ProductId::new("P-1"), Money::new(30_000), 0)
                .await
        );
        assert!(!catalog.reprice(&ProductId::new("P-2"), Money::new(1), 0).await);

        let product = catalog
            .find_product(&ProductId::new("P-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.discounted_price(), Money::new(30_000));
    }
}
