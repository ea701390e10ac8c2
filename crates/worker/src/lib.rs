//! Background work for the market ingestor.
//!
//! - `cycle`: one fetch, normalize, persist and alert pass over the series catalogue
//! - `scheduler`: warm-up, hour alignment and the hourly trigger
//! - `stream`: the inbound telemetry consume loop

pub mod alert;
pub mod cycle;
pub mod scheduler;
pub mod stream;

pub use alert::maybe_alert;
pub use cycle::*;
pub use scheduler::*;
pub use stream::*;
