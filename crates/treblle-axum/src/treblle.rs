//! Shared middleware state.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum_client_ip::ClientIpSource;
use futures::FutureExt;
use treblle_core::{
    FieldsToMask, Payload, PayloadTransport, SdkInfo, TreblleConfig, TransportService,
};

use crate::middleware::TRACING_TARGET;
use crate::{SDK_NAME, SDK_VERSION};

#[derive(Clone)]
struct TreblleInner {
    /// `None` when credentials are missing; the middleware then passes through.
    sdk: Option<SdkInfo>,
    fields: FieldsToMask,
    max_body_size: usize,
    client_ip_source: ClientIpSource,
    transport: TransportService,
}

/// Middleware state holding credentials, masking rules and the transport.
///
/// Cheap to clone; every clone shares the same transport.
#[derive(Clone)]
pub struct Treblle {
    inner: Arc<TreblleInner>,
}

impl fmt::Debug for Treblle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Treblle")
            .field("sdk", &self.inner.sdk)
            .field("fields", &self.inner.fields)
            .field("max_body_size", &self.inner.max_body_size)
            .field("client_ip_source", &self.inner.client_ip_source)
            .finish_non_exhaustive()
    }
}

impl Treblle {
    /// Creates the middleware state for the given transport.
    pub fn new<T>(config: TreblleConfig, transport: T) -> Self
    where
        T: PayloadTransport + 'static,
    {
        Self::with_service(config, TransportService::new(transport))
    }

    /// Creates the middleware state from an already wrapped transport.
    ///
    /// Missing credentials are not an error: a warning is logged once and the
    /// middleware forwards requests without observing them.
    pub fn with_service(config: TreblleConfig, transport: TransportService) -> Self {
        let fields = config.fields_to_mask();
        let sdk = match (config.api_key, config.project_id) {
            (Some(api_key), Some(project_id))
                if !api_key.trim().is_empty() && !project_id.trim().is_empty() =>
            {
                Some(SdkInfo::new(api_key, project_id, SDK_NAME, SDK_VERSION))
            }
            _ => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    "Treblle api key or project id is missing, payloads will not be sent"
                );
                None
            }
        };

        tracing::debug!(
            target: TRACING_TARGET,
            enabled = sdk.is_some(),
            masked_fields = fields.len(),
            max_body_size = config.max_body_size,
            "Treblle middleware configured"
        );

        let inner = TreblleInner {
            sdk,
            fields,
            max_body_size: config.max_body_size,
            client_ip_source: ClientIpSource::ConnectInfo,
            transport,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates the middleware state delivering payloads over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector endpoint is invalid or the HTTP
    /// client cannot be built.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn with_reqwest(
        config: TreblleConfig,
        reqwest_config: treblle_reqwest::ReqwestConfig,
    ) -> treblle_reqwest::Result<Self> {
        let transport = treblle_reqwest::ReqwestTransport::new(reqwest_config)?;
        Ok(Self::with_service(config, transport.into_service()))
    }

    /// Sets where the client address is read from.
    ///
    /// Defaults to [`ClientIpSource::ConnectInfo`], which requires serving the
    /// router with `into_make_service_with_connect_info`. Behind a proxy, pick
    /// the header the proxy sets. A `ClientIpSource` installed as a router
    /// extension takes precedence.
    pub fn with_client_ip_source(mut self, source: ClientIpSource) -> Self {
        Arc::make_mut(&mut self.inner).client_ip_source = source;
        self
    }

    /// Returns `true` if payloads are assembled and sent.
    pub fn is_enabled(&self) -> bool {
        self.inner.sdk.is_some()
    }

    /// Returns the field names masked in every payload.
    pub fn fields_to_mask(&self) -> &FieldsToMask {
        &self.inner.fields
    }

    /// Returns the largest body, in bytes, buffered into a payload.
    pub fn max_body_size(&self) -> usize {
        self.inner.max_body_size
    }

    /// Returns where the client address is read from.
    pub fn client_ip_source(&self) -> &ClientIpSource {
        &self.inner.client_ip_source
    }

    pub(crate) fn sdk(&self) -> Option<&SdkInfo> {
        self.inner.sdk.as_ref()
    }

    /// Sends the payload on a detached task.
    ///
    /// Transport failures and panics are logged and never reach the caller.
    pub(crate) fn dispatch(&self, payload: Payload) {
        let transport = self.inner.transport.clone();
        let send = AssertUnwindSafe(async move { transport.send(&payload).await }).catch_unwind();

        tokio::spawn(async move {
            // Delivery errors are already logged by the transport service.
            if send.await.is_err() {
                tracing::error!(
                    target: TRACING_TARGET,
                    "Treblle transport panicked while sending payload"
                );
            }
        });
    }
}
