//! HTTP server with a bounded graceful shutdown.

mod shutdown;

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::pin::pin;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use self::shutdown::wait_for_signal;
use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Server startup, runtime and shutdown errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind to {address}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server runtime error")]
    Runtime(#[source] io::Error),

    #[error("in-flight requests did not finish within {}s of the shutdown signal", .0.as_secs())]
    ShutdownTimeout(Duration),
}

/// Binds the configured address and serves `app` until a termination signal.
///
/// Requests carry `ConnectInfo<SocketAddr>`. Once a signal arrives, in-flight
/// requests get [`ServerConfig::shutdown_timeout`] to finish; after that the
/// server gives up on them and returns [`ServerError::ShutdownTimeout`].
pub async fn serve(app: Router, config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.server_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr,
            source,
        })?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %addr,
        "Listening for connections"
    );

    if config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Listening on all interfaces, the demo routes are reachable from the network"
        );
    }

    let (signalled, on_signal) = oneshot::channel();
    let stop = async move {
        let signal = wait_for_signal().await;
        let _ = signalled.send(signal);
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop)
    .into_future();
    let mut server = pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(ServerError::Runtime),
        Ok(signal) = on_signal => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                signal = %signal,
                timeout_secs = config.shutdown_timeout().as_secs(),
                "Draining in-flight requests"
            );
        }
    }

    drain(server, config.shutdown_timeout()).await?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        "Server stopped"
    );
    Ok(())
}

/// Waits for a server that is already shutting down, up to `timeout`.
async fn drain<F>(server: F, timeout: Duration) -> Result<(), ServerError>
where
    F: Future<Output = io::Result<()>>,
{
    match tokio::time::timeout(timeout, server).await {
        Ok(result) => result.map_err(ServerError::Runtime),
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = timeout.as_secs(),
                "Shutdown timeout elapsed, dropping open connections"
            );
            Err(ServerError::ShutdownTimeout(timeout))
        }
    }
}
