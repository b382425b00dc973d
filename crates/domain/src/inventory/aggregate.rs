//! Stock aggregate.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{StockError, StockEvent, StockKey};

/// Stock counter for one [`StockKey`].
///
/// `available` is what can still be sold; `reserved` is what placed orders
/// hold. Both are non-negative by construction: every decrement is checked
/// against the state the command was decided on, and the append carries that
/// state's version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stock {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    key: Option<StockKey>,

    available: u32,

    reserved: u32,
}

impl Aggregate for Stock {
    type Event = StockEvent;
    type Error = StockError;

    fn aggregate_type() -> &'static str {
        "Stock"
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
        if self.key.is_none() {
            self.id = Some(event.key().stream_id());
            self.key = Some(event.key().clone());
        }

        match event {
            StockEvent::StockReceived(data) => {
                self.available = self.available.saturating_add(data.quantity);
            }
            StockEvent::StockReserved(data) => {
                self.available = self.available.saturating_sub(data.quantity);
                self.reserved = self.reserved.saturating_add(data.quantity);
            }
            StockEvent::StockReleased(data) => {
                self.reserved = self.reserved.saturating_sub(data.quantity);
                self.available = self.available.saturating_add(data.quantity);
            }
        }
    }
}

impl Stock {
    pub fn key(&self) -> Option<&StockKey> {
        self.key.as_ref()
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }
}

impl Stock {
    pub fn receive(&self, key: &StockKey, quantity: u32) -> Result<Vec<StockEvent>, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }

        let total = u64::from(self.available) + u64::from(self.reserved) + u64::from(quantity);
        if total > u64::from(u32::MAX) {
            return Err(StockError::Overflow { key: key.clone() });
        }

        Ok(vec![StockEvent::stock_received(key.clone(), quantity)])
    }

    /// Takes `quantity` units for `order_id`.
    pub fn reserve(
        &self,
        key: &StockKey,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<StockEvent>, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }

        if quantity > self.available {
            return Err(StockError::OutOfStock {
                key: key.clone(),
                requested: quantity,
                available: self.available,
            });
        }

        Ok(vec![StockEvent::stock_reserved(key.clone(), order_id, quantity)])
    }

    /// Gives back `quantity` units previously reserved by `order_id`.
    pub fn release(
        &self,
        key: &StockKey,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<StockEvent>, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }

        if quantity > self.reserved {
            return Err(StockError::ReleaseExceedsReserved {
                key: key.clone(),
                requested: quantity,
                reserved: self.reserved,
            });
        }

        Ok(vec![StockEvent::stock_released(key.clone(), order_id, quantity)])
    }
}
