//! Time-series provider client.
//!
//! Fetches hourly series from the provider's widget endpoints and
//! deserializes the `included[].attributes` envelope.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod series;

pub use client::*;
pub use config::*;
pub use error::FetchError;
pub use models::*;
pub use retry::RetryPolicy;
pub use series::*;
