// src/lookup/transport.rs

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Request header carrying the registry credential.
const KEY_HEADER: &str = "passthrough";

/// Raw reply from one registry call, before classification.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: StatusCode,
    pub body: String,
}

/// Network-level failure of one attempt. Both variants are transient from the
/// rotation loop's point of view.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// Seam between the rotation loop and the wire. The production implementation
/// talks HTTP; tests substitute scripted replies.
#[async_trait]
pub trait GstinTransport: Send + Sync {
    /// Performs one registry call for `gstin` authenticated with `api_key`,
    /// bounded by `timeout`.
    async fn fetch(
        &self,
        api_key: &SecretString,
        gstin: &str,
        timeout: Duration,
    ) -> Result<RawReply, TransportError>;
}

/// HTTP GET against the registry endpoint, with the GSTIN as a query
/// parameter and the active key in the `passthrough` header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl GstinTransport for HttpTransport {
    async fn fetch(
        &self,
        api_key: &SecretString,
        gstin: &str,
        timeout: Duration,
    ) -> Result<RawReply, TransportError> {
        debug!(endpoint = %self.endpoint, "Issuing registry request");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("gstin", gstin)])
            .header(KEY_HEADER, api_key.expose_secret().as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawReply { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}
