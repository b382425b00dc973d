//! Stock reservation and release.
//!
//! Every stock movement in the engine goes through [`Inventory`]: restocking
//! directly, reservations and releases staged into a [`UnitOfWork`] so they
//! commit together with the order they belong to.

use common::AggregateId;
use domain::{Aggregate, CommandHandler, Stock, StockEvent, StockKey, UnitOfWork};
use event_store::EventStore;

use crate::config::CheckoutConfig;
use crate::error::Result;
use crate::retry::with_retry;

pub struct Inventory<S: EventStore> {
    stocks: CommandHandler<S, Stock>,
    config: CheckoutConfig,
}

impl<S: EventStore> Inventory<S> {
    pub fn new(store: S, config: CheckoutConfig) -> Self {
        Self {
            stocks: CommandHandler::new(store),
            config,
        }
    }

    /// Units currently available for `key`. Unknown keys have none.
    pub async fn available(&self, key: &StockKey) -> Result<u32> {
        Ok(self.stocks.load(key.stream_id()).await?.available())
    }

    /// Adds `quantity` units to `key` and returns the new available count.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn receive(&self, key: &StockKey, quantity: u32) -> Result<u32> {
        let result = with_retry("receive_stock", self.config.max_commit_attempts, || async {
            Ok(self
                .stocks
                .execute(key.stream_id(), |stock| stock.receive(key, quantity))
                .await?)
        })
        .await?;

        tracing::info!(quantity, available = result.aggregate.available(), "stock received");
        Ok(result.aggregate.available())
    }

    pub(crate) async fn load(&self, key: &StockKey) -> Result<Stock> {
        Ok(self.stocks.load(key.stream_id()).await?)
    }
}

/// Stock streams touched by one commit.
///
/// Each stream is loaded once; movements are decided in order against a
/// working copy so several movements on one key land in a single append
/// stamped with the version that was loaded.
#[derive(Default)]
pub(crate) struct StockLedger {
    entries: Vec<LedgerEntry>,
}

pub(crate) struct LedgerEntry {
    key: StockKey,
    loaded: Stock,
    working: Stock,
    events: Vec<StockEvent>,
}

impl LedgerEntry {
    /// Available units after the movements staged so far.
    pub(crate) fn available(&self) -> u32 {
        self.working.available()
    }

    pub(crate) fn reserve(&mut self, order_id: AggregateId, quantity: u32) -> Result<()> {
        let events = self.working.reserve(&self.key, order_id, quantity)?;
        self.stage(events);
        Ok(())
    }

    pub(crate) fn release(&mut self, order_id: AggregateId, quantity: u32) -> Result<()> {
        let events = self.working.release(&self.key, order_id, quantity)?;
        self.stage(events);
        Ok(())
    }

    fn stage(&mut self, events: Vec<StockEvent>) {
        self.working.apply_events(events.iter().cloned());
        self.events.extend(events);
    }
}

impl StockLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn entry<S: EventStore>(
        &mut self,
        inventory: &Inventory<S>,
        key: &StockKey,
    ) -> Result<&mut LedgerEntry> {
        let position = match self.entries.iter().position(|e| &e.key == key) {
            Some(position) => position,
            None => {
                let loaded = inventory.load(key).await?;
                self.entries.push(LedgerEntry {
                    key: key.clone(),
                    working: loaded.clone(),
                    loaded,
                    events: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        Ok(&mut self.entries[position])
    }

    /// Stages every decided movement into `uow`.
    pub(crate) fn record_into(self, uow: &mut UnitOfWork) -> Result<()> {
        for entry in self.entries {
            uow.record(entry.key.stream_id(), &entry.loaded, &entry.events)?;
        }
        Ok(())
    }
}
