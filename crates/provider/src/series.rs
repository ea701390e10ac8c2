//! Series catalogue and fetch requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Granularity the provider aggregates values to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeTruncation {
    #[default]
    Hour,
    Day,
    Month,
}

impl TimeTruncation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

/// How fetched values are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Rows in `market_prices`, checked for alerts.
    Price,
    /// Rows in `energy_metrics`, one metric per series title.
    EnergyMetric,
}

/// A provider endpoint, addressed by `<category>/<widget>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSpec {
    pub category: &'static str,
    pub widget: &'static str,
    pub kind: SeriesKind,
}

impl SeriesSpec {
    pub const fn price(category: &'static str, widget: &'static str) -> Self {
        Self {
            category,
            widget,
            kind: SeriesKind::Price,
        }
    }

    pub const fn energy(category: &'static str, widget: &'static str) -> Self {
        Self {
            category,
            widget,
            kind: SeriesKind::EnergyMetric,
        }
    }

    /// `category/widget`, used in logs.
    pub fn path(&self) -> String {
        format!("{}/{}", self.category, self.widget)
    }
}

/// Known provider series.
pub mod catalogue {
    use super::SeriesSpec;

    /// Real-time market prices (PVPC).
    pub const MARKET_PRICES: SeriesSpec =
        SeriesSpec::price("mercados", "precios-mercados-tiempo-real");

    pub const GENERATION_MIX: SeriesSpec =
        SeriesSpec::energy("generacion", "estructura-generacion");

    pub const DEMAND: SeriesSpec = SeriesSpec::energy("demanda", "evolucion");

    pub const EMISSIONS: SeriesSpec =
        SeriesSpec::energy("generacion", "no-renovables-detalle-emisiones");

    /// Auxiliary series fetched after prices, in order.
    pub const ENERGY_SERIES: &[SeriesSpec] = &[GENERATION_MIX, DEMAND, EMISSIONS];
}

/// Parameters for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub category: String,
    pub widget: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_trunc: Option<TimeTruncation>,
}

impl SeriesRequest {
    /// Builds a request, rejecting `start > end`.
    pub fn new(
        spec: &SeriesSpec,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        time_trunc: Option<TimeTruncation>,
    ) -> Result<Self, FetchError> {
        if start > end {
            return Err(FetchError::InvalidRange { start, end });
        }

        Ok(Self {
            category: spec.category.to_string(),
            widget: spec.widget.to_string(),
            start,
            end,
            time_trunc,
        })
    }
}
