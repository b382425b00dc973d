//! Domain layer of the marketplace checkout engine.
//!
//! - `Aggregate` / `DomainEvent` traits and the command handler
//! - `Cart`, `Stock` and `Order` aggregates
//! - the order status state machine and payment sub-state
//! - catalog and buyer lookup contracts

pub mod aggregate;
pub mod buyer;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod error;
pub mod inventory;
pub mod order;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use buyer::{Buyer, BuyerDirectory, InMemoryBuyerDirectory};
pub use cart::{Cart, CartError, CartEvent, CartLine};
pub use catalog::{Catalog, InMemoryCatalog, Product, ProductOption};
pub use command::{CommandHandler, CommandResult, UnitOfWork, build_envelopes};
pub use error::DomainError;
pub use inventory::{Stock, StockError, StockEvent, StockKey};
pub use order::{
    DeliveryInfo, Order, OrderError, OrderEvent, OrderLine, OrderLineView, OrderStatus,
    OrderView, PaymentMethod, PaymentState, PaymentStatus, TransitionError,
};
pub use value_objects::{BuyerId, CartLineId, Money, OptionId, OrderToken, ProductId, SellerId};
