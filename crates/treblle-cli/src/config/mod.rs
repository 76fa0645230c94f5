//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig       # Host, port, shutdown, client address source
//! ├── treblle: TreblleConfig     # Credentials, masking, body limit
//! └── transport: ReqwestConfig   # Collector endpoint, timeout
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.

mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use treblle_core::TreblleConfig;
use treblle_reqwest::ReqwestConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "treblle-cli")]
#[command(about = "Demo server observed by the Treblle middleware")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Treblle credentials and masking rules.
    #[clap(flatten)]
    pub treblle: TreblleConfig,

    /// Collector transport configuration.
    #[clap(flatten)]
    pub transport: ReqwestConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.treblle
            .validate()
            .context("invalid treblle configuration")?;
        self.transport
            .endpoint_url()
            .context("invalid treblle endpoint")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            "Build information"
        );

        self.server.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            enabled = self.treblle.is_enabled(),
            additional_fields_to_mask = ?self.treblle.additional_fields_to_mask,
            max_body_size = self.treblle.max_body_size,
            endpoint = %self.transport.endpoint,
            timeout_secs = self.transport.effective_timeout().as_secs(),
            "Treblle configured"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags() {
        let cli = Cli::try_parse_from([
            "treblle-cli",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--client-ip-source",
            "x-real-ip",
            "--treblle-api-key",
            "key",
            "--treblle-project-id",
            "project",
            "--treblle-mask-fields",
            "pin,otp",
            "--treblle-endpoint",
            "http://127.0.0.1:9000/",
        ])
        .expect("valid arguments");

        assert_eq!(cli.server.port, 8080);
        assert_eq!(cli.server.client_ip_source, server::IpSource::XRealIp);
        assert!(cli.treblle.is_enabled());
        assert_eq!(cli.treblle.additional_fields_to_mask, ["pin", "otp"]);
        assert!(cli.treblle.fields_to_mask().contains("pin"));
        assert_eq!(cli.transport.endpoint, "http://127.0.0.1:9000/");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn reject_invalid_endpoint() {
        let cli = Cli::try_parse_from([
            "treblle-cli",
            "--host",
            "127.0.0.1",
            "--port",
            "3000",
            "--treblle-endpoint",
            "not a url",
        ])
        .expect("valid arguments");
        assert!(cli.validate().is_err());
    }
}
