//! Assembly of the outbound payload.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::schema::{
    ErrorRecord, LanguageInfo, Payload, PayloadData, RequestInfo, ResponseInfo, ServerInfo,
};

/// Envelope identifying the sender of a payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkInfo {
    pub api_key: String,
    pub project_id: String,
    pub sdk: String,
    pub version: String,
}

impl SdkInfo {
    /// Creates an envelope for the given credentials and SDK identity.
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        sdk: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            sdk: sdk.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Debug for SdkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkInfo")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("sdk", &self.sdk)
            .field("version", &self.version)
            .finish()
    }
}

/// Builder for a [`Payload`].
///
/// # Examples
///
/// ```rust
/// use treblle_core::{PayloadBuilder, RequestInfo, ResponseInfo, SdkInfo};
///
/// let sdk = SdkInfo::new("api-key", "project-id", "rust-axum", "0.1.0");
/// let payload = PayloadBuilder::new(sdk)
///     .protocol("http/1.1")
///     .request(RequestInfo::default())
///     .response(ResponseInfo::default())
///     .build();
///
/// assert_eq!(payload.data.server.protocol, "http/1.1");
/// ```
#[derive(Debug, Clone)]
#[must_use = "builders do nothing unless built"]
pub struct PayloadBuilder {
    sdk: SdkInfo,
    protocol: String,
    server_ip: Option<String>,
    request: RequestInfo,
    response: ResponseInfo,
    errors: Vec<ErrorRecord>,
}

impl PayloadBuilder {
    /// Starts a payload for the given envelope.
    pub fn new(sdk: SdkInfo) -> Self {
        Self {
            sdk,
            protocol: "http/1.1".to_owned(),
            server_ip: None,
            request: RequestInfo::default(),
            response: ResponseInfo::default(),
            errors: Vec::new(),
        }
    }

    /// Sets the `<scheme>/<http version>` the request was served over.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Sets the local address the request was served on.
    pub fn server_ip(mut self, ip: impl Into<String>) -> Self {
        self.server_ip = Some(ip.into());
        self
    }

    /// Sets the request snapshot.
    pub fn request(mut self, request: RequestInfo) -> Self {
        self.request = request;
        self
    }

    /// Sets the response snapshot.
    pub fn response(mut self, response: ResponseInfo) -> Self {
        self.response = response;
        self
    }

    /// Appends an error record.
    pub fn error(mut self, error: ErrorRecord) -> Self {
        self.errors.push(error);
        self
    }

    /// Appends error records.
    pub fn errors(mut self, errors: impl IntoIterator<Item = ErrorRecord>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Assembles the payload, filling in host and language details.
    pub fn build(self) -> Payload {
        let mut server = ServerInfo::detect(self.protocol);
        server.ip = self.server_ip;

        Payload {
            api_key: self.sdk.api_key,
            project_id: self.sdk.project_id,
            sdk: self.sdk.sdk,
            version: self.sdk.version,
            data: PayloadData {
                server,
                language: LanguageInfo::default(),
                request: self.request,
                response: self.response,
                errors: self.errors,
            },
        }
    }
}

/// Formats a timestamp the way the collector expects: `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp.strftime("%Y-%m-%d %H:%M:%S").to_string()
}
