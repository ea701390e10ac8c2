//! PostgreSQL/TimescaleDB persistence for the market ingestor.

pub mod client;
pub mod config;
pub mod health;
pub mod market;
pub mod schema;
pub mod telemetry_store;

pub use client::*;
pub use config::*;
pub use market::MarketStore;
pub use schema::SchemaReport;
pub use telemetry_store::TelemetrySink;
