//! Broker configuration.

use serde::{Deserialize, Serialize};

use crate::topics::topic;

/// Where a consumer without a stored position starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl std::str::FromStr for OffsetReset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" | "smallest" | "beginning" => Ok(Self::Earliest),
            "latest" | "largest" | "end" => Ok(Self::Latest),
            other => Err(format!("unknown offset reset policy '{}'", other)),
        }
    }
}

/// Inbound consumer configuration.
///
/// `group_id`, `topic` and `offset_reset` are required at startup and have
/// no defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub offset_reset: Option<OffsetReset>,
    /// Longest a single read blocks waiting for records, in milliseconds
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: i32,
    /// Upper bound on bytes returned by one read
    #[serde(default = "default_max_bytes")]
    pub max_bytes: i32,
}

fn default_max_wait_ms() -> i32 {
    500
}

fn default_max_bytes() -> i32 {
    1024 * 1024
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: String::new(),
            topic: String::new(),
            offset_reset: None,
            max_wait_ms: default_max_wait_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Bootstrap broker addresses. Required.
    #[serde(default)]
    pub brokers: Vec<String>,
    /// SASL username (SCRAM-SHA-256 over TLS when both credentials are set)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password
    #[serde(default)]
    pub sasl_password: Option<String>,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Outbound alert topic
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
    /// Timeout for topic creation, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: i32,
}

fn default_alert_topic() -> String {
    topic::PRICE_ALERT.to_string()
}

fn default_request_timeout_ms() -> i32 {
    5_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            sasl_username: None,
            sasl_password: None,
            consumer: ConsumerConfig::default(),
            alert_topic: default_alert_topic(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BrokerConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Both SASL credentials, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
