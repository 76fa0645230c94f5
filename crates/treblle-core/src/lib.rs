#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod body;
mod config;
pub mod constants;
mod error;
mod mask;
mod payload;
pub mod schema;
mod timer;
pub mod transport;

pub use body::{ResponseBody, ResponsePayload, request_payload, response_payload};
pub use config::TreblleConfig;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use mask::{FieldsToMask, mask_headers, mask_in_place, mask_sensitive_values};
pub use payload::{PayloadBuilder, SdkInfo, format_timestamp};
pub use schema::{
    ErrorRecord, LanguageInfo, OsInfo, Payload, PayloadData, RequestInfo, ResponseInfo,
    ServerInfo,
};
pub use timer::RequestTimer;
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub use transport::MockTransport;
pub use transport::{PayloadTransport, TransportResponse, TransportService};

/// The version of this crate, reported as the SDK version by default.
pub const TREBLLE_SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
