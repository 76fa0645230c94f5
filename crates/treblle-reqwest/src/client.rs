//! Reqwest-based HTTP transport for payload delivery.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use treblle_core::constants::API_KEY_HEADER;
use treblle_core::{Payload, PayloadTransport, TransportResponse, TransportService};
use url::Url;

use crate::{Error, ReqwestConfig, Result, TRACING_TARGET};

/// Inner transport that holds the HTTP client and configuration.
struct ReqwestTransportInner {
    http: Client,
    endpoint: Url,
    config: ReqwestConfig,
}

/// Reqwest-based transport delivering payloads to the Treblle collector.
///
/// # Examples
///
/// ```rust,ignore
/// use treblle_reqwest::{ReqwestConfig, ReqwestTransport};
///
/// let transport = ReqwestTransport::new(ReqwestConfig::default())?;
/// let response = transport.send(&payload).await?;
/// ```
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Arc<ReqwestTransportInner>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Creates a new transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be created.
    pub fn new(config: ReqwestConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            endpoint = %endpoint,
            timeout_ms = timeout.as_millis(),
            "Creating reqwest transport"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        let inner = ReqwestTransportInner {
            http,
            endpoint,
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the transport configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Gets the collector endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Converts this transport into a [`TransportService`] for use with dependency injection.
    pub fn into_service(self) -> TransportService {
        TransportService::new(self)
    }

    async fn post(&self, payload: &Payload) -> Result<TransportResponse> {
        let started_at = Instant::now();
        let body = serde_json::to_vec(payload)?;

        tracing::trace!(
            target: TRACING_TARGET,
            endpoint = %self.inner.endpoint,
            bytes = body.len(),
            "Posting payload"
        );

        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &payload.api_key)
            .body(body)
            .send()
            .await
            .map_err(Error::from)?;

        Ok(TransportResponse::new(
            response.status().as_u16(),
            started_at.elapsed(),
        ))
    }
}

#[async_trait::async_trait]
impl PayloadTransport for ReqwestTransport {
    async fn send(&self, payload: &Payload) -> treblle_core::Result<TransportResponse> {
        Ok(self.post(payload).await?)
    }
}
