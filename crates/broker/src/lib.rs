//! Kafka-compatible broker access for the market ingestor.
//!
//! - `consumer`: inbound telemetry reads with in-process offset tracking
//! - `producer`: outbound price alerts
//! - `topics`: topic names and idempotent topic creation

pub mod config;
pub mod connection;
pub mod consumer;
pub mod health;
pub mod producer;
pub mod topics;

pub use config::*;
pub use consumer::*;
pub use producer::*;
pub use topics::*;
