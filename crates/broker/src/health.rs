//! Broker health checks.

use crate::config::BrokerConfig;
use crate::connection;
use tracing::{debug, error};

/// Check broker connection health by listing topics.
pub async fn check_connection(config: &BrokerConfig) -> bool {
    let client = match connection::connect(config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Broker connection failed: {}", e);
            return false;
        }
    };

    match client.list_topics().await {
        Ok(topics) => {
            debug!(topics = topics.len(), "Broker connection healthy");
            true
        }
        Err(e) => {
            error!("Failed to list broker topics: {}", e);
            false
        }
    }
}

/// Returns the subset of `topics` that does not exist yet.
pub async fn missing_topics(config: &BrokerConfig, topics: &[&str]) -> Vec<String> {
    let all = || topics.iter().map(|t| t.to_string()).collect();

    let Ok(client) = connection::connect(config).await else {
        return all();
    };

    match client.list_topics().await {
        Ok(existing) => {
            let existing: std::collections::HashSet<_> =
                existing.iter().map(|t| t.name.as_str()).collect();

            topics
                .iter()
                .filter(|t| !existing.contains(*t))
                .map(|t| t.to_string())
                .collect()
        }
        Err(_) => all(),
    }
}
