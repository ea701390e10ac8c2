//! Inbound telemetry messages.
//!
//! Producers publish the nested form:
//!
//! ```json
//! {"metadata": {"message_id": "m-1", "asset_id": "inv-7"},
//!  "payload": {"timestamp": "2024-01-01T10:00:00Z",
//!              "metrics": [{"name": "power_kw", "value": 3.2, "unit": "kW"}]}}
//! ```
//!
//! The flat form with `message_id` and `asset_id` at the top level is accepted too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single named reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMetric {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metrics: Vec<TelemetryMetric>,
}

/// One decoded telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TelemetryWire")]
pub struct TelemetryMessage {
    pub message_id: String,
    pub asset_id: String,
    pub payload: TelemetryPayload,
}

impl TelemetryMessage {
    /// Decodes a raw topic payload.
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Deserialize)]
struct TelemetryMetadata {
    message_id: String,
    asset_id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TelemetryWire {
    Nested {
        metadata: TelemetryMetadata,
        payload: TelemetryPayload,
    },
    Flat {
        message_id: String,
        asset_id: String,
        payload: TelemetryPayload,
    },
}

impl From<TelemetryWire> for TelemetryMessage {
    fn from(wire: TelemetryWire) -> Self {
        match wire {
            TelemetryWire::Nested { metadata, payload } => Self {
                message_id: metadata.message_id,
                asset_id: metadata.asset_id,
                payload,
            },
            TelemetryWire::Flat {
                message_id,
                asset_id,
                payload,
            } => Self {
                message_id,
                asset_id,
                payload,
            },
        }
    }
}
