//! HTTP route handlers.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod sellers;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path or query identifier, answering 400 on malformed input.
pub(crate) fn parse_id<T: FromStr>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} ID format: {e}")))
}
