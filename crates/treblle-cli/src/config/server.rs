//! Listener, client address and shutdown settings.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::ensure;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use treblle_axum::ClientIpSource;

use crate::TRACING_TARGET_CONFIG;

/// Ports that can be bound without elevated privileges.
const UNPRIVILEGED_PORTS: RangeInclusive<u16> = 1024..=u16::MAX;

/// Accepted drain window after a shutdown signal, in seconds.
const SHUTDOWN_TIMEOUT_SECS: RangeInclusive<u64> = 1..=300;

/// Where the client address recorded in payloads comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpSource {
    /// Peer address of the TCP connection.
    #[default]
    ConnectInfo,
    /// Last address of `X-Forwarded-For`.
    RightmostXForwardedFor,
    /// Last `for=` of the `Forwarded` header.
    RightmostForwarded,
    /// `X-Real-Ip`, as set by nginx.
    XRealIp,
    /// `CF-Connecting-IP`, as set by Cloudflare.
    CfConnectingIp,
    /// `True-Client-IP`, as set by Akamai and Cloudflare.
    TrueClientIp,
}

impl From<IpSource> for ClientIpSource {
    fn from(source: IpSource) -> Self {
        match source {
            IpSource::ConnectInfo => Self::ConnectInfo,
            IpSource::RightmostXForwardedFor => Self::RightmostXForwardedFor,
            IpSource::RightmostForwarded => Self::RightmostForwarded,
            IpSource::XRealIp => Self::XRealIp,
            IpSource::CfConnectingIp => Self::CfConnectingIp,
            IpSource::TrueClientIp => Self::TrueClientIp,
        }
    }
}

/// Demo server settings.
///
/// Read from `HOST`, `PORT`, `SHUTDOWN_TIMEOUT` and `CLIENT_IP_SOURCE`, or
/// the matching flags.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Address to listen on; `0.0.0.0` exposes the server on every interface.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds in-flight requests get to finish once a shutdown signal arrives.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", value_name = "SECONDS", default_value_t = 30)]
    pub shutdown_timeout: u64,

    /// Source of the client address recorded in payloads.
    #[arg(long, env = "CLIENT_IP_SOURCE", value_enum, default_value = "connect-info")]
    #[serde(default)]
    pub client_ip_source: IpSource,
}

impl ServerConfig {
    /// Checks the port and the shutdown window.
    ///
    /// # Errors
    ///
    /// Fails for privileged ports and for a shutdown window outside
    /// 1 to 300 seconds.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            UNPRIVILEGED_PORTS.contains(&self.port),
            "port {} requires elevated privileges, pick one in 1024-65535",
            self.port
        );
        ensure!(
            SHUTDOWN_TIMEOUT_SECS.contains(&self.shutdown_timeout),
            "shutdown timeout of {}s is outside 1-300 seconds",
            self.shutdown_timeout
        );
        Ok(())
    }

    /// Socket address the listener binds.
    #[must_use]
    pub const fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Time in-flight requests get to drain after a shutdown signal.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Client address source handed to the middleware.
    pub fn client_ip_source(&self) -> ClientIpSource {
        self.client_ip_source.into()
    }

    #[must_use]
    pub const fn binds_to_all_interfaces(&self) -> bool {
        self.host.is_unspecified()
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            addr = %self.server_addr(),
            shutdown_timeout_secs = self.shutdown_timeout,
            client_ip_source = ?self.client_ip_source,
            "Server configured"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            shutdown_timeout: 30,
            client_ip_source: IpSource::default(),
        }
    }
}
