//! Delivery of payloads to the collector.
//!
//! [`PayloadTransport`] is the seam between payload assembly and the network:
//! integrations hold a [`TransportService`] and never talk to an HTTP client
//! directly, so tests can substitute a mock.

#[cfg(any(test, feature = "test-utils"))]
mod mock;
mod service;

use std::time::Duration;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockTransport;
pub use service::TransportService;

use crate::error::Result;
use crate::schema::Payload;

/// Tracing target for transport operations.
pub const TRACING_TARGET: &str = "treblle_core::transport";

/// Core trait for payload delivery.
///
/// Implement this trait to create custom transports.
#[async_trait::async_trait]
pub trait PayloadTransport: Send + Sync {
    /// Sends a payload to the collector.
    async fn send(&self, payload: &Payload) -> Result<TransportResponse>;
}

/// Outcome of a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code answered by the collector.
    pub status_code: u16,
    /// Time spent delivering the payload.
    pub elapsed: Duration,
}

impl TransportResponse {
    /// Creates a new transport response.
    pub fn new(status_code: u16, elapsed: Duration) -> Self {
        Self {
            status_code,
            elapsed,
        }
    }

    /// Returns whether the collector accepted the payload (2xx status code).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
