//! Stock domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::StockKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockEvent {
    /// Units arrived (restock or initial seeding).
    StockReceived(StockReceivedData),

    /// Units taken by a placed order.
    StockReserved(StockReservedData),

    /// Units given back by a cancelled order.
    StockReleased(StockReleasedData),
}

impl DomainEvent for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockReceived(_) => "StockReceived",
            StockEvent::StockReserved(_) => "StockReserved",
            StockEvent::StockReleased(_) => "StockReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceivedData {
    pub key: StockKey,
    pub quantity: u32,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    pub key: StockKey,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReleasedData {
    pub key: StockKey,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub released_at: DateTime<Utc>,
}

impl StockEvent {
    pub fn stock_received(key: StockKey, quantity: u32) -> Self {
        StockEvent::StockReceived(StockReceivedData {
            key,
            quantity,
            received_at: Utc::now(),
        })
    }

    pub fn stock_reserved(key: StockKey, order_id: AggregateId, quantity: u32) -> Self {
        StockEvent::StockReserved(StockReservedData {
            key,
            order_id,
            quantity,
            reserved_at: Utc::now(),
        })
    }

    pub fn stock_released(key: StockKey, order_id: AggregateId, quantity: u32) -> Self {
        StockEvent::StockReleased(StockReleasedData {
            key,
            order_id,
            quantity,
            released_at: Utc::now(),
        })
    }

    pub fn key(&self) -> &StockKey {
        match self {
            StockEvent::StockReceived(data) => &data.key,
            StockEvent::StockReserved(data) => &data.key,
            StockEvent::StockReleased(data) => &data.key,
        }
    }
}
