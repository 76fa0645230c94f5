//! Extraction of request and response metadata from `http` types.

use std::collections::BTreeMap;

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Version};
use axum_client_ip::{ClientIp, ClientIpSource};
use treblle_core::constants::UNKNOWN_IP;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request metadata captured before the handler consumes the request.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub ip: String,
    pub user_agent: String,
    pub protocol: String,
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub query: Option<String>,
}

impl RequestSnapshot {
    pub async fn capture(parts: &mut Parts, ip_source: &ClientIpSource) -> Self {
        let ip = client_ip(parts, ip_source).await;

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);
        let scheme = uri
            .scheme_str()
            .or_else(|| header_str(&parts.headers, X_FORWARDED_PROTO))
            .unwrap_or("http");
        let host = uri
            .authority()
            .map(|authority| authority.as_str())
            .or_else(|| header_str(&parts.headers, HOST.as_str()))
            .unwrap_or("localhost");
        let path = uri
            .path_and_query()
            .map_or("/", |path_and_query| path_and_query.as_str());

        Self {
            method: parts.method.to_string(),
            url: format!("{scheme}://{host}{path}"),
            ip,
            user_agent: header_str(&parts.headers, USER_AGENT.as_str())
                .unwrap_or_default()
                .to_owned(),
            protocol: protocol(scheme, parts.version),
            headers: header_map(&parts.headers),
            content_type: header_str(&parts.headers, CONTENT_TYPE.as_str()).map(str::to_owned),
            query: uri.query().map(str::to_owned),
        }
    }
}

/// Flattens headers into a map; repeated values are joined with `", "`.
pub(crate) fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>();
            (name.as_str().to_owned(), values.join(", "))
        })
        .collect()
}

/// Resolves the client address with [`ClientIp`].
///
/// A [`ClientIpSource`] already installed on the request (e.g. by a router
/// layer) wins over `ip_source`. Unresolvable addresses become `bogon`.
pub(crate) async fn client_ip(parts: &mut Parts, ip_source: &ClientIpSource) -> String {
    let installed = parts.extensions.get::<ClientIpSource>().is_none();
    if installed {
        parts.extensions.insert(ip_source.clone());
    }

    let resolved = ClientIp::from_request_parts(parts, &()).await;

    if installed {
        parts.extensions.remove::<ClientIpSource>();
    }

    match resolved {
        Ok(ClientIp(ip)) => ip.to_string(),
        Err(_) => UNKNOWN_IP.to_owned(),
    }
}

/// Formats the protocol as `scheme/version`, e.g. `http/1.1`.
pub(crate) fn protocol(scheme: &str, version: Version) -> String {
    let version = match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    };
    format!("{}/{version}", scheme.to_ascii_lowercase())
}

/// Parses the declared `Content-Length`, if any.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_LENGTH.as_str()).and_then(|value| value.trim().parse().ok())
}

/// Returns `true` for bodies that must not be buffered.
pub(crate) fn is_streaming(headers: &HeaderMap) -> bool {
    header_str(headers, CONTENT_TYPE.as_str())
        .is_some_and(|content_type| content_type.starts_with("text/event-stream"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
