//! Test fixtures: provider series, telemetry payloads and instants.

use broker::InboundMessage;
use chrono::{DateTime, TimeZone, Utc};
use provider::{Series, SeriesValue};
use uuid::Uuid;

/// UTC instant helper.
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid test instant")
}

/// A series built from `(raw datetime, value)` pairs.
pub fn series(title: &str, values: &[(&str, f64)]) -> Series {
    Series {
        title: title.to_string(),
        values: values
            .iter()
            .map(|(datetime, value)| SeriesValue {
                datetime: datetime.to_string(),
                value: *value,
            })
            .collect(),
    }
}

/// Five consecutive hourly prices on 2024-01-01 in provider format (+01:00).
pub fn five_hourly_prices() -> Series {
    series(
        "PVPC",
        &[
            ("2024-01-01T00:00:00.000+01:00", 41.2),
            ("2024-01-01T01:00:00.000+01:00", 38.9),
            ("2024-01-01T02:00:00.000+01:00", 35.0),
            ("2024-01-01T03:00:00.000+01:00", 33.7),
            ("2024-01-01T04:00:00.000+01:00", 36.4),
        ],
    )
}

/// Provider response body for the negative-price example.
pub fn negative_price_body() -> serde_json::Value {
    serde_json::json!({
        "included": [{
            "type": "PVPC",
            "id": "1001",
            "attributes": {
                "title": "PVPC",
                "values": [
                    {"datetime": "2024-01-01T00:00:00.000+01:00", "value": -5.2, "percentage": 1}
                ]
            }
        }]
    })
}

/// A telemetry message in the producer's nested form.
pub fn telemetry_json(asset_id: &str, metrics: &[(&str, f64, &str)]) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "message_id": Uuid::new_v4().to_string(),
            "asset_id": asset_id,
        },
        "payload": {
            "timestamp": "2024-06-01T12:00:00Z",
            "metrics": metrics
                .iter()
                .map(|(name, value, unit)| serde_json::json!({
                    "name": name,
                    "value": value,
                    "unit": unit,
                }))
                .collect::<Vec<_>>(),
        }
    })
}

/// An inbound record carrying `json` on partition 0.
pub fn inbound(offset: i64, json: &serde_json::Value) -> InboundMessage {
    inbound_on(0, offset, json)
}

/// An inbound record carrying `json` on `partition`.
pub fn inbound_on(partition: i32, offset: i64, json: &serde_json::Value) -> InboundMessage {
    InboundMessage {
        partition,
        offset,
        key: None,
        payload: Some(serde_json::to_vec(json).expect("serializable fixture")),
    }
}

/// An inbound record whose payload is not JSON.
pub fn malformed(offset: i64) -> InboundMessage {
    InboundMessage {
        partition: 0,
        offset,
        key: None,
        payload: Some(b"{\"metadata\": not json".to_vec()),
    }
}
