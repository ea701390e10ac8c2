//! Market data records and the derived price alert event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source label for the day-ahead price series.
pub const PRICE_SOURCE: &str = "REE_PVPC";

/// Source label for the auxiliary energy series.
pub const ENERGY_SOURCE: &str = "REE_API";

pub const DEFAULT_CURRENCY: &str = "EUR";

pub const DEFAULT_PRICE_UNIT: &str = "€/MWh";

/// One hourly market price.
///
/// Unique per `(timestamp, source)`; a later write for the same key
/// replaces `price` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub currency: String,
    pub unit: String,
    pub source: String,
}

impl PricePoint {
    /// A price from the default price series, quoted in EUR per MWh.
    pub fn pvpc(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            unit: DEFAULT_PRICE_UNIT.to_string(),
            source: PRICE_SOURCE.to_string(),
        }
    }
}

/// One reading from an auxiliary energy series.
///
/// Unique per `(timestamp, metric_name, source)`. `metric_name` is the
/// series title as labelled by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyMetric {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub source: String,
}

/// Alert kinds raised from persisted prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NegativePrice,
}

/// Event name carried by every alert.
pub const PRICE_ALERT_EVENT: &str = "price_alert";

/// Outbound alert payload. Published, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlertEvent {
    pub event: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub currency: String,
    pub unit: String,
}

impl PriceAlertEvent {
    /// Builds a negative-price alert, or `None` when the price is not below zero.
    pub fn negative_price(point: &PricePoint) -> Option<Self> {
        (point.price < 0.0).then(|| Self {
            event: PRICE_ALERT_EVENT.to_string(),
            kind: AlertKind::NegativePrice,
            timestamp: point.timestamp,
            price: point.price,
            currency: point.currency.clone(),
            unit: point.unit.clone(),
        })
    }
}
