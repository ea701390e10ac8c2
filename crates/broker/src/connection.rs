//! Shared client construction.

use std::sync::Arc;

use ingest_core::{Error, Result};
use rskafka::client::{Client, ClientBuilder, Credentials, SaslConfig};

use crate::config::BrokerConfig;

/// Creates a TLS configuration for managed brokers.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Connects to the bootstrap brokers, with TLS and SASL when credentials are set.
pub async fn connect(config: &BrokerConfig) -> Result<Client> {
    if config.brokers.is_empty() {
        return Err(Error::config("no broker addresses configured"));
    }

    let mut builder = ClientBuilder::new(config.brokers.clone());

    if let Some((username, password)) = config.credentials() {
        builder = builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.to_string(),
                password.to_string(),
            )));
    }

    builder
        .build()
        .await
        .map_err(|e| Error::broker(format!("failed to connect to {}: {}", config.broker_string(), e)))
}
