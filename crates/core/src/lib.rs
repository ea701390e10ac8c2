//! Core types, datetime normalization, and errors for the market ingestor.

pub mod datetime;
pub mod error;
pub mod market;
pub mod telemetry;

pub use datetime::{parse_provider_datetime, ParseError};
pub use error::{Error, Result};
pub use market::*;
pub use telemetry::*;
