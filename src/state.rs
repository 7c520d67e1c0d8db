// src/state.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::lookup::{HttpTransport, LookupClient};
use reqwest::Client;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Shared application state accessible by all Axum handlers.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub lookup: LookupClient<HttpTransport>,
}

impl AppState {
    /// Creates the shared state: one HTTP client for all lookup attempts and
    /// the rotation client configured from `config.lookup`.
    pub fn new(config: &AppConfig) -> Result<Self> {
        info!("Creating shared AppState: initializing lookup client...");

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .user_agent(concat!("gstin-lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AppError::HttpClientBuild)?;

        let endpoint = Url::parse(&config.lookup.endpoint).map_err(|e| {
            AppError::Config(format!(
                "Invalid lookup endpoint '{}': {}",
                config.lookup.endpoint, e
            ))
        })?;

        let lookup = LookupClient::new(
            HttpTransport::new(client, endpoint),
            config.lookup.retry_policy(),
        );

        Ok(Self {
            config: config.clone(),
            lookup,
        })
    }
}
