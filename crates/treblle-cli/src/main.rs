#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod routes;
mod server;

use std::process;

use anyhow::Context;
use treblle_axum::Treblle;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "treblle_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "treblle_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "treblle_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let treblle = Treblle::with_reqwest(cli.treblle, cli.transport)
        .context("failed to create treblle transport")?
        .with_client_ip_source(cli.server.client_ip_source());
    let router = routes::router(treblle);

    server::serve(router, cli.server).await?;

    Ok(())
}
