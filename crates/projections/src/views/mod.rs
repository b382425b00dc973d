//! Read model views.

mod buyer_orders;
mod seller_orders;

pub use buyer_orders::BuyerOrdersView;
pub use seller_orders::{SellerOrdersView, SellerScope};

use std::collections::HashMap;

use common::AggregateId;
use domain::{Aggregate, Order, OrderView};
use event_store::EventEnvelope;

use crate::{ProjectionError, Result};

/// Applies `event` to the order it belongs to.
///
/// Returns `None` for events of other aggregates.
fn apply_order_event<'a>(
    orders: &'a mut HashMap<AggregateId, Order>,
    event: &EventEnvelope,
) -> Result<Option<&'a Order>> {
    if event.aggregate_type != Order::aggregate_type() {
        return Ok(None);
    }

    let order = orders.entry(event.aggregate_id).or_default();
    order
        .apply_envelope(event)
        .map_err(|source| ProjectionError::Decode {
            event_type: event.event_type.clone(),
            source,
        })?;
    Ok(Some(order))
}

/// Views of `ids`, newest placement first.
fn newest_first<'a>(
    orders: &HashMap<AggregateId, Order>,
    ids: impl IntoIterator<Item = &'a AggregateId>,
) -> Vec<OrderView> {
    let mut views: Vec<OrderView> = ids
        .into_iter()
        .filter_map(|id| orders.get(id))
        .filter_map(Order::view)
        .collect();
    views.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
    views
}
