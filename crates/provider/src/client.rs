//! HTTP client for the provider's widget endpoints.
//!
//! Request shape:
//! `GET <base>/<category>/<widget>?start_date=YYYY-MM-DDTHH:MM&end_date=...&time_trunc=hour`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use telemetry::metrics;
use tracing::{debug, info};
use url::Url;

use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::models::{Series, SeriesResponse};
use crate::series::SeriesRequest;

/// Query datetime format: ISO-8601 with minute precision.
pub const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Anything that can produce titled series for a request.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Performs one fetch. No caching and no retries.
    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<Series>, FetchError>;
}

/// Provider client. Build once and share; the inner connection pool is reused.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Creates a client with its own `reqwest::Client`.
    pub fn new(config: ProviderConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Created provider client"
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Builds the request URL for `request`.
    pub fn request_url(&self, request: &SeriesRequest) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.category,
            request.widget
        ))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "start_date",
                &request.start.format(QUERY_DATETIME_FORMAT).to_string(),
            );
            query.append_pair(
                "end_date",
                &request.end.format(QUERY_DATETIME_FORMAT).to_string(),
            );
            if let Some(trunc) = request.time_trunc {
                query.append_pair("time_trunc", trunc.as_str());
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SeriesSource for ProviderClient {
    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<Series>, FetchError> {
        if request.start > request.end {
            return Err(FetchError::InvalidRange {
                start: request.start,
                end: request.end,
            });
        }

        let url = self.request_url(request)?;
        let start = Instant::now();

        debug!(url = %url, "Requesting provider series");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = response.text().await.unwrap_or_default();

            return Err(FetchError::Status {
                status: status.as_u16(),
                content_type,
                body,
            });
        }

        let body = response.bytes().await?;
        let envelope: SeriesResponse = serde_json::from_slice(&body)?;
        let series: Vec<Series> = envelope.into();

        let elapsed = start.elapsed();
        metrics().fetch_latency_ms.observe(elapsed.as_millis() as u64);
        metrics().series_fetched.inc_by(series.len() as u64);

        debug!(
            category = %request.category,
            widget = %request.widget,
            series = series.len(),
            latency_ms = %elapsed.as_millis(),
            "Fetched provider series"
        );

        Ok(series)
    }
}
