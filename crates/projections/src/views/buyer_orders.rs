//! A buyer's orders, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BuyerId, Order, OrderView};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use super::{apply_order_event, newest_first};
use crate::Result;
use crate::projection::Projection;

#[derive(Default)]
struct BuyerOrdersState {
    orders: HashMap<AggregateId, Order>,
    by_buyer: HashMap<BuyerId, Vec<AggregateId>>,
}

/// Orders per buyer for the "my orders" page and its change polling.
#[derive(Clone, Default)]
pub struct BuyerOrdersView {
    state: Arc<RwLock<BuyerOrdersState>>,
}

impl BuyerOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    /// All of the buyer's orders in reverse chronological order.
    pub async fn orders_for_buyer(&self, buyer_id: BuyerId) -> Vec<OrderView> {
        let state = self.state.read().await;
        match state.by_buyer.get(&buyer_id) {
            Some(ids) => newest_first(&state.orders, ids),
            None => Vec::new(),
        }
    }

    /// The buyer's orders that changed after `since`, newest first.
    pub async fn updates_since(&self, buyer_id: BuyerId, since: DateTime<Utc>) -> Vec<OrderView> {
        let mut orders = self.orders_for_buyer(buyer_id).await;
        orders.retain(|order| order.updated_at > since);
        orders
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl Projection for BuyerOrdersView {
    fn name(&self) -> &'static str {
        "BuyerOrdersView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let is_new = !state.orders.contains_key(&event.aggregate_id);
        let Some(order) = apply_order_event(&mut state.orders, event)? else {
            return Ok(());
        };

        if let Some(buyer_id) = order.buyer_id().filter(|_| is_new) {
            state
                .by_buyer
                .entry(buyer_id)
                .or_default()
                .push(event.aggregate_id);
        }
        Ok(())
    }

    async fn reset(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.by_buyer.clear();
    }
}
