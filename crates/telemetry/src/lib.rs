//! Internal telemetry for the market ingestor.
//!
//! Structured logs go through `tracing`; counters and latency histograms
//! live in process and are logged at the end of every fetch cycle.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
