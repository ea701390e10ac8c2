//! Process configuration.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `config/default.toml` (optional)
//! - `INGESTOR__<section>__<field>` environment variables
//! - flat overrides such as `INGESTOR_BROKERS` and the legacy
//!   `ConnectionStrings__messaging` / `EMMA_DB_URI`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

use broker::{BrokerConfig, OffsetReset};
use provider::{ProviderConfig, TimeTruncation};
use storage::DatabaseConfig;
use worker::CycleConfig;

/// Fetch window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Hours of history requested by every cycle
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_time_trunc")]
    pub time_trunc: Option<TimeTruncation>,
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_time_trunc() -> Option<TimeTruncation> {
    Some(TimeTruncation::Hour)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            time_trunc: default_time_trunc(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Values that must be present before anything connects.
#[derive(Debug, Validate)]
struct RequiredSettings {
    #[validate(length(min = 1, message = "broker bootstrap address is required"))]
    brokers: Vec<String>,
    #[validate(length(min = 1, message = "consumer group id is required"))]
    group_id: String,
    #[validate(required(message = "offset reset policy is required"))]
    offset_reset: Option<OffsetReset>,
    #[validate(length(min = 1, message = "inbound topic is required"))]
    topic: String,
    #[validate(length(min = 1, message = "database url is required"))]
    database_url: String,
    #[validate(url(message = "provider base url is not a valid url"))]
    provider_base_url: String,
    #[validate(range(min = 1, message = "lookback must be at least one hour"))]
    lookback_hours: i64,
}

impl AppConfig {
    /// Loads and validates configuration.
    pub fn load() -> Result<Self> {
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("INGESTOR")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: AppConfig = built
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies flat variables. `lookup` returns the value of a variable, if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(brokers) = get(&["INGESTOR_BROKERS", "ConnectionStrings__messaging"]) {
            self.broker.brokers = split_brokers(&brokers);
        }
        if let Some(url) = get(&["INGESTOR_DATABASE_URL", "EMMA_DB_URI"]) {
            self.database.url = url;
        }
        if let Some(group_id) = get(&["INGESTOR_GROUP_ID"]) {
            self.broker.consumer.group_id = group_id;
        }
        if let Some(reset) = get(&["INGESTOR_OFFSET_RESET"]) {
            let policy = reset
                .parse::<OffsetReset>()
                .map_err(|e| anyhow!("INGESTOR_OFFSET_RESET: {}", e))?;
            self.broker.consumer.offset_reset = Some(policy);
        }
        if let Some(topic) = get(&["INGESTOR_TOPIC"]) {
            self.broker.consumer.topic = topic;
        }
        if let Some(base_url) = get(&["INGESTOR_PROVIDER_BASE_URL"]) {
            self.provider.base_url = base_url;
        }
        if let Some(username) = get(&["INGESTOR_SASL_USERNAME"]) {
            self.broker.sasl_username = Some(username);
        }
        if let Some(password) = get(&["INGESTOR_SASL_PASSWORD"]) {
            self.broker.sasl_password = Some(password);
        }

        Ok(())
    }

    /// Fails with every missing or invalid required value.
    pub fn validate(&self) -> Result<()> {
        let required = RequiredSettings {
            brokers: self.broker.brokers.clone(),
            group_id: self.broker.consumer.group_id.trim().to_string(),
            offset_reset: self.broker.consumer.offset_reset,
            topic: self.broker.consumer.topic.trim().to_string(),
            database_url: self.database.url.trim().to_string(),
            provider_base_url: self.provider.base_url.clone(),
            lookback_hours: self.schedule.lookback_hours,
        };

        required
            .validate()
            .map_err(|e| anyhow!("invalid configuration: {}", e))
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig::default()
            .with_lookback_hours(self.schedule.lookback_hours)
            .with_time_trunc(self.schedule.time_trunc)
            .with_retry(self.provider.retry.clone())
    }
}

fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
