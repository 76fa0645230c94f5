//! Payload schema accepted by the Treblle collector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{INVALID_JSON_ERROR_TYPE, ON_SHUTDOWN_ERROR_SOURCE};

/// Document sent to the collector for one request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Collector credential.
    pub api_key: String,
    /// Monitored project identifier.
    pub project_id: String,
    /// SDK name, e.g. `rust-axum`.
    pub sdk: String,
    /// SDK version.
    pub version: String,
    /// The observed request/response cycle.
    pub data: PayloadData,
}

/// Data block of a [`Payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadData {
    pub server: ServerInfo,
    pub language: LanguageInfo,
    pub request: RequestInfo,
    pub response: ResponseInfo,
    pub errors: Vec<ErrorRecord>,
}

/// Host serving the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub ip: Option<String>,
    pub timezone: String,
    pub software: Option<String>,
    pub signature: Option<String>,
    /// `<scheme>/<http version>`, e.g. `http/1.1`.
    pub protocol: String,
    pub os: OsInfo,
}

impl ServerInfo {
    /// Describes the current host for a request served over `protocol`.
    pub fn detect(protocol: impl Into<String>) -> Self {
        let timezone = jiff::tz::TimeZone::system()
            .iana_name()
            .unwrap_or("UTC")
            .to_owned();

        Self {
            ip: None,
            timezone,
            software: None,
            signature: None,
            protocol: protocol.into(),
            os: OsInfo::detect(),
        }
    }
}

/// Operating system of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub release: Option<String>,
    pub architecture: String,
}

impl OsInfo {
    /// Reads the operating system details of the current host.
    pub fn detect() -> Self {
        Self {
            name: sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_owned()),
            release: sysinfo::System::kernel_version(),
            architecture: std::env::consts::ARCH.to_owned(),
        }
    }
}

/// Language runtime of the integration.
///
/// The default reports the `rustc` release that compiled the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "rust".to_owned(),
            version: env!("TREBLLE_RUSTC_VERSION").to_owned(),
        }
    }
}

/// Snapshot of the incoming request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// UTC time the request was received, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub ip: String,
    pub url: String,
    pub user_agent: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Snapshot of the final response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub headers: BTreeMap<String, String>,
    pub code: u16,
    /// Body length in bytes.
    pub size: u64,
    /// Handler execution time in milliseconds.
    pub load_time: f64,
    pub body: Option<Value>,
}

/// Problem detected while observing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl ErrorRecord {
    /// Record for a response body that is not valid JSON.
    pub fn invalid_json() -> Self {
        Self {
            source: ON_SHUTDOWN_ERROR_SOURCE.to_owned(),
            kind: INVALID_JSON_ERROR_TYPE.to_owned(),
            message: "Invalid JSON format".to_owned(),
            file: None,
            line: None,
        }
    }

    /// Returns whether this record reports an invalid JSON body.
    pub fn is_invalid_json(&self) -> bool {
        self.kind == INVALID_JSON_ERROR_TYPE
    }
}
