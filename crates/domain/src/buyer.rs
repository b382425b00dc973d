//! Buyer lookup. Accounts and authentication are managed elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::DomainError;
use crate::value_objects::BuyerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: BuyerId,
    pub name: String,
    pub email: String,
}

#[async_trait]
pub trait BuyerDirectory: Send + Sync {
    async fn find_buyer(&self, buyer_id: BuyerId) -> Result<Option<Buyer>, DomainError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBuyerDirectory {
    buyers: Arc<RwLock<HashMap<BuyerId, Buyer>>>,
}

impl InMemoryBuyerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, buyer: Buyer) {
        self.buyers.write().await.insert(buyer.id, buyer);
    }
}

#[async_trait]
impl BuyerDirectory for InMemoryBuyerDirectory {
    async fn find_buyer(&self, buyer_id: BuyerId) -> Result<Option<Buyer>, DomainError> {
        Ok(self.buyers.read().await.get(&buyer_id).cloned())
    }
}
