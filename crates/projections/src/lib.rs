//! Query side of the checkout engine.
//!
//! - [`Projection`] folds stored events into a read model
//! - [`ProjectionProcessor`] feeds events from the store to projections
//! - [`BuyerOrdersView`]: a buyer's orders, newest first
//! - [`SellerOrdersView`]: orders containing a seller's products

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::Projection;
pub use views::{BuyerOrdersView, SellerOrdersView, SellerScope};
