//! In-memory transport for testing.
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! treblle-core = { version = "...", features = ["test-utils"] }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use super::{PayloadTransport, TransportResponse};
use crate::error::{Error, Result};
use crate::schema::Payload;

#[derive(Debug, Default)]
struct MockState {
    payloads: Mutex<Vec<Payload>>,
    delivered: Notify,
}

/// Transport that records payloads instead of sending them.
///
/// Clones share the same record, so a test can hand one clone to the
/// middleware and assert on another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Creates a transport that accepts every payload with `200 OK`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that records every payload, then fails with a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delays every send by `delay` before recording the payload.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the payloads received so far.
    pub fn payloads(&self) -> Vec<Payload> {
        self.state
            .payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until at least `count` payloads were received or `timeout` elapsed,
    /// then returns the payloads received so far.
    pub async fn wait_for_payloads(&self, count: usize, timeout: Duration) -> Vec<Payload> {
        let deadline = Instant::now() + timeout;
        loop {
            let payloads = self.payloads();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if payloads.len() >= count || remaining.is_zero() {
                return payloads;
            }

            let _ = tokio::time::timeout(remaining, self.state.delivered.notified()).await;
        }
    }
}

#[async_trait::async_trait]
impl PayloadTransport for MockTransport {
    async fn send(&self, payload: &Payload) -> Result<TransportResponse> {
        let started_at = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.state
            .payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());
        self.state.delivered.notify_one();

        if self.fail {
            return Err(Error::network_error().with_message("mock transport failure"));
        }

        Ok(TransportResponse::new(200, started_at.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PayloadBuilder, SdkInfo};

    fn payload() -> Payload {
        PayloadBuilder::new(SdkInfo::new("key", "project", "test", "0.0.0")).build()
    }

    #[tokio::test]
    async fn test_records_payloads_across_clones() {
        let mock = MockTransport::new();
        let clone = mock.clone();

        clone.send(&payload()).await.unwrap();
        assert_eq!(mock.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_payloads() {
        let mock = MockTransport::new().with_delay(Duration::from_millis(20));
        let sender = mock.clone();
        tokio::spawn(async move { sender.send(&payload()).await });

        let payloads = mock.wait_for_payloads(1, Duration::from_secs(2)).await;
        assert_eq!(payloads.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_payloads_times_out() {
        let mock = MockTransport::new();

        let payloads = mock
            .wait_for_payloads(1, Duration::from_millis(20))
            .await;
        assert!(payloads.is_empty());
    }
}
