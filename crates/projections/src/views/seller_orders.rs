//! Orders that contain a seller's products.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Order, OrderView, SellerId};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{apply_order_event, newest_first};
use crate::Result;
use crate::projection::Projection;

/// Which of a seller's orders to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerScope {
    /// Pending through shipped.
    Active,
    /// Delivered or cancelled.
    Completed,
    #[default]
    All,
}

impl SellerScope {
    fn includes(&self, order: &OrderView) -> bool {
        match self {
            SellerScope::Active => order.status.is_active(),
            SellerScope::Completed => order.status.is_terminal(),
            SellerScope::All => true,
        }
    }
}

impl FromStr for SellerScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(SellerScope::Active),
            "completed" => Ok(SellerScope::Completed),
            "all" => Ok(SellerScope::All),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

#[derive(Default)]
struct SellerOrdersState {
    orders: HashMap<AggregateId, Order>,
    by_seller: HashMap<SellerId, Vec<AggregateId>>,
}

/// Orders per seller. An order with lines from several sellers is listed
/// for each of them.
#[derive(Clone, Default)]
pub struct SellerOrdersView {
    state: Arc<RwLock<SellerOrdersState>>,
}

impl SellerOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn orders(&self, seller_id: SellerId, scope: SellerScope) -> Vec<OrderView> {
        let state = self.state.read().await;
        let Some(ids) = state.by_seller.get(&seller_id) else {
            return Vec::new();
        };

        let mut orders = newest_first(&state.orders, ids);
        orders.retain(|order| scope.includes(order));
        orders
    }

    pub async fn orders_for_seller(&self, seller_id: SellerId) -> Vec<OrderView> {
        self.orders(seller_id, SellerScope::All).await
    }

    pub async fn active_orders(&self, seller_id: SellerId) -> Vec<OrderView> {
        self.orders(seller_id, SellerScope::Active).await
    }

    pub async fn completed_orders(&self, seller_id: SellerId) -> Vec<OrderView> {
        self.orders(seller_id, SellerScope::Completed).await
    }

    pub async fn seller_count(&self) -> usize {
        self.state.read().await.by_seller.len()
    }
}

#[async_trait]
impl Projection for SellerOrdersView {
    fn name(&self) -> &'static str {
        "SellerOrdersView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let is_new = !state.orders.contains_key(&event.aggregate_id);
        let Some(order) = apply_order_event(&mut state.orders, event)? else {
            return Ok(());
        };
        if !is_new {
            return Ok(());
        }

        let mut sellers: Vec<SellerId> = order.lines().iter().map(|l| l.seller_id).collect();
        sellers.sort();
        sellers.dedup();
        for seller_id in sellers {
            state
                .by_seller
                .entry(seller_id)
                .or_default()
                .push(event.aggregate_id);
        }
        Ok(())
    }

    async fn reset(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.by_seller.clear();
    }
}
