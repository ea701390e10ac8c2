//! Provider response envelope.

use serde::{Deserialize, Serialize};

/// Top-level response: `{ "included": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub included: Vec<IncludedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludedItem {
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub attributes: SeriesAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesAttributes {
    pub title: String,
    #[serde(default)]
    pub values: Vec<SeriesValue>,
}

/// One raw point. `datetime` is normalized later, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesValue {
    pub datetime: String,
    pub value: f64,
}

/// A titled series as returned by a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub title: String,
    pub values: Vec<SeriesValue>,
}

impl From<SeriesResponse> for Vec<Series> {
    fn from(response: SeriesResponse) -> Self {
        response
            .included
            .into_iter()
            .map(|item| Series {
                title: item.attributes.title,
                values: item.attributes.values,
            })
            .collect()
    }
}
