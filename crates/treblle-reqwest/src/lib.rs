//! Reqwest-based payload transport for Treblle integrations.
//!
//! This crate provides [`ReqwestTransport`], an implementation of
//! [`treblle_core::PayloadTransport`] that delivers payloads over HTTPS.
//!
//! # Example
//!
//! ```rust,ignore
//! use treblle_reqwest::{ReqwestConfig, ReqwestTransport};
//!
//! // Create a transport with default configuration
//! let transport = ReqwestTransport::new(ReqwestConfig::default())?;
//!
//! // Convert to a service for dependency injection
//! let service = transport.into_service();
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod config;
mod error;

pub use crate::client::ReqwestTransport;
pub use crate::config::{DEFAULT_TIMEOUT_SECS, ReqwestConfig};
pub use crate::error::{Error, Result};

/// Tracing target for reqwest transport operations.
pub const TRACING_TARGET: &str = "treblle_reqwest";
