//! Cart operations with live catalog and stock checks.

use std::sync::Arc;

use domain::{
    BuyerDirectory, BuyerId, Cart, CartError, CartLineId, Catalog, CommandHandler, DomainError,
    Money, OptionId, ProductId, StockKey,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::inventory::Inventory;
use crate::lookup::{require_buyer, resolve_product};
use crate::retry::with_retry;

/// A cart line priced with current catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub option_id: Option<OptionId>,
    pub option_label: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    /// Stock currently available for the line's key.
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub buyer_id: BuyerId,
    pub lines: Vec<CartLineView>,
    pub total: Money,
}

pub struct CartService<S: EventStore + Clone> {
    carts: CommandHandler<S, Cart>,
    inventory: Inventory<S>,
    catalog: Arc<dyn Catalog>,
    buyers: Arc<dyn BuyerDirectory>,
    config: CheckoutConfig,
}

impl<S: EventStore + Clone> CartService<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        buyers: Arc<dyn BuyerDirectory>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            inventory: Inventory::new(store, config.clone()),
            catalog,
            buyers,
            config,
        }
    }

    /// Adds a product (optionally a specific option) to the buyer's cart,
    /// merging with an existing line for the same combination.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        buyer_id: BuyerId,
        product_id: ProductId,
        option_id: Option<OptionId>,
        quantity: u32,
    ) -> Result<CartView> {
        require_buyer(self.buyers.as_ref(), buyer_id).await?;
        let (product, _) =
            resolve_product(self.catalog.as_ref(), &product_id, option_id.as_ref()).await?;
        let key = StockKey::for_line(&product_id, option_id.as_ref());

        with_retry("add_cart_line", self.config.max_commit_attempts, || async {
            let available = self.inventory.available(&key).await?;
            self.carts
                .execute(Cart::stream_id(buyer_id), |cart| {
                    cart.add_line(
                        buyer_id,
                        product_id.clone(),
                        option_id.clone(),
                        quantity,
                        available,
                    )
                })
                .await
                .map_err(|e| exceeds_stock(e, &key, &product.name))
        })
        .await?;

        self.get_cart(buyer_id).await
    }

    /// Replaces a line's quantity; it may not exceed current stock.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        buyer_id: BuyerId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<CartView> {
        require_buyer(self.buyers.as_ref(), buyer_id).await?;

        with_retry("set_cart_quantity", self.config.max_commit_attempts, || async {
            let cart = self.carts.load(Cart::stream_id(buyer_id)).await?;
            let line = cart
                .line(line_id)
                .ok_or(CheckoutError::CartLineNotFound(line_id))?;
            let key = line.stock_key();
            let (product, _) = resolve_product(
                self.catalog.as_ref(),
                &line.product_id,
                line.option_id.as_ref(),
            )
            .await?;
            let available = self.inventory.available(&key).await?;

            self.carts
                .execute(Cart::stream_id(buyer_id), |cart| {
                    cart.set_quantity(line_id, quantity, available)
                })
                .await
                .map_err(|e| exceeds_stock(e, &key, &product.name))
        })
        .await?;

        self.get_cart(buyer_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_line(&self, buyer_id: BuyerId, line_id: CartLineId) -> Result<CartView> {
        require_buyer(self.buyers.as_ref(), buyer_id).await?;

        with_retry("remove_cart_line", self.config.max_commit_attempts, || async {
            Ok(self
                .carts
                .execute(Cart::stream_id(buyer_id), |cart| cart.remove_line(line_id))
                .await?)
        })
        .await?;

        self.get_cart(buyer_id).await
    }

    /// The buyer's cart with current prices. Lines whose product left the
    /// catalog are omitted.
    pub async fn get_cart(&self, buyer_id: BuyerId) -> Result<CartView> {
        let cart = self.carts.load(Cart::stream_id(buyer_id)).await?;

        let mut lines = Vec::with_capacity(cart.line_count());
        for line in cart.lines() {
            let (product, option) = match resolve_product(
                self.catalog.as_ref(),
                &line.product_id,
                line.option_id.as_ref(),
            )
            .await
            {
                Ok(found) => found,
                Err(CheckoutError::ProductNotFound(_) | CheckoutError::OptionUnavailable { .. }) => {
                    tracing::warn!(product_id = %line.product_id, "cart line refers to unavailable product");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let surcharge = option.as_ref().map(|o| o.additional_price).unwrap_or_default();
            let unit_price = product.discounted_price() + surcharge;
            lines.push(CartLineView {
                line_id: line.line_id,
                product_id: line.product_id.clone(),
                product_name: product.name,
                option_id: line.option_id.clone(),
                option_label: option.as_ref().map(|o| o.label()),
                quantity: line.quantity,
                unit_price,
                line_total: unit_price.times(line.quantity),
                available: self.inventory.available(&line.stock_key()).await?,
            });
        }

        let total = lines.iter().map(|l| l.line_total).sum();
        Ok(CartView {
            buyer_id,
            lines,
            total,
        })
    }

    pub async fn line_count(&self, buyer_id: BuyerId) -> Result<usize> {
        Ok(self
            .carts
            .load(Cart::stream_id(buyer_id))
            .await?
            .line_count())
    }
}

fn exceeds_stock(e: DomainError, key: &StockKey, product_name: &str) -> CheckoutError {
    match e {
        DomainError::Cart(CartError::ExceedsStock {
            requested,
            available,
        }) => CheckoutError::OutOfStock {
            item: key.clone(),
            product_name: product_name.to_string(),
            requested,
            available,
        },
        other => other.into(),
    }
}
