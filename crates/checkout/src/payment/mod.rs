//! Payment gateway contract and its implementations.

mod gateway;
mod http;
mod memory;

pub use gateway::{ConfirmRequest, GatewayError, PaymentApproval, PaymentCancellation, PaymentGateway};
pub use http::{DEFAULT_GATEWAY_URL, HttpPaymentGateway};
pub use memory::InMemoryPaymentGateway;
