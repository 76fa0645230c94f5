//! Transport service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{PayloadTransport, TRACING_TARGET, TransportResponse};
use crate::error::Result;
use crate::schema::Payload;

/// Transport service wrapper with observability.
///
/// This wrapper adds structured logging to any payload transport.
/// The inner transport is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct TransportService {
    inner: Arc<dyn PayloadTransport>,
}

impl fmt::Debug for TransportService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportService").finish_non_exhaustive()
    }
}

impl TransportService {
    /// Create a new transport service wrapper.
    pub fn new<T>(transport: T) -> Self
    where
        T: PayloadTransport + 'static,
    {
        Self {
            inner: Arc::new(transport),
        }
    }

    /// Sends a payload through the wrapped transport.
    pub async fn send(&self, payload: &Payload) -> Result<TransportResponse> {
        let started_at = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET,
            project_id = %payload.project_id,
            method = %payload.data.request.method,
            url = %payload.data.request.url,
            status = payload.data.response.code,
            "Sending payload"
        );

        let result = self.inner.send(payload).await;
        let elapsed = started_at.elapsed();

        match &result {
            Ok(response) if response.is_success() => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    status_code = response.status_code,
                    elapsed_ms = elapsed.as_millis(),
                    "Payload delivered"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    status_code = response.status_code,
                    elapsed_ms = elapsed.as_millis(),
                    "Payload rejected by collector"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Payload delivery error"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::{ErrorKind, PayloadBuilder, SdkInfo};

    fn payload() -> Payload {
        PayloadBuilder::new(SdkInfo::new("key", "project", "test", "0.0.0")).build()
    }

    #[tokio::test]
    async fn test_send_delegates_to_transport() {
        let mock = MockTransport::new();
        let service = TransportService::new(mock.clone());

        let response = service.send(&payload()).await.unwrap();
        assert!(response.is_success());
        assert_eq!(mock.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_send_propagates_errors() {
        let service = TransportService::new(MockTransport::failing());

        let error = service.send(&payload()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NetworkError);
    }
}
