#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod extensions;
pub mod middleware;
mod treblle;

pub use extensions::RouterExt;
pub use middleware::treblle_middleware;
pub use treblle::Treblle;

pub use axum_client_ip::ClientIpSource;

/// SDK name reported in every payload envelope.
pub const SDK_NAME: &str = "rust-axum";

/// SDK version reported in every payload envelope.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
