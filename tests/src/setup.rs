//! Common test setup functions.

use std::sync::Arc;

use provider::{catalogue, RetryPolicy};
use worker::{CycleConfig, FetchCycle};

use crate::mocks::{MockAlerts, MockSeriesSource, MockStore};

/// A fetch cycle wired to in-memory mocks.
///
/// Retries are disabled so failed fetches surface on the first attempt.
pub struct CycleHarness {
    pub source: Arc<MockSeriesSource>,
    pub store: Arc<MockStore>,
    pub alerts: Arc<MockAlerts>,
    pub cycle: FetchCycle,
}

impl CycleHarness {
    pub fn new() -> Self {
        Self::with_config(CycleConfig::default().with_retry(RetryPolicy::none()))
    }

    pub fn with_config(config: CycleConfig) -> Self {
        let source = Arc::new(MockSeriesSource::new());
        let store = Arc::new(MockStore::new());
        let alerts = Arc::new(MockAlerts::new());

        let cycle = FetchCycle::new(source.clone(), store.clone(), alerts.clone(), config);

        Self {
            source,
            store,
            alerts,
            cycle,
        }
    }

    /// Path of the price series, for scripting responses.
    pub fn price_path() -> String {
        catalogue::MARKET_PRICES.path()
    }
}

impl Default for CycleHarness {
    fn default() -> Self {
        Self::new()
    }
}
