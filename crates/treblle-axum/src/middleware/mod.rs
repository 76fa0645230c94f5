//! Request observation middleware.
//!
//! [`treblle_middleware`] buffers request and response bodies of a known size,
//! times the inner handler and hands a masked payload to the transport on a
//! detached task. The response returned to the client is never altered.

mod capture;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::response::Parts as ResponseParts;
use axum::middleware::Next;
use axum::response::Response;
use futures::StreamExt;
use treblle_core::{
    Payload, PayloadBuilder, RequestInfo, RequestTimer, ResponseBody, ResponseInfo,
    ResponsePayload, format_timestamp, mask_headers, mask_in_place, request_payload,
    response_payload,
};

use self::capture::{RequestSnapshot, content_length, header_map, is_streaming};
use crate::Treblle;

/// Tracing target for the middleware.
pub(crate) const TRACING_TARGET: &str = "treblle_axum::middleware";

/// Observes the request/response cycle and forwards it to Treblle.
///
/// Use with [`axum::middleware::from_fn_with_state`], or through
/// [`RouterExt::with_treblle`](crate::RouterExt::with_treblle).
pub async fn treblle_middleware(
    State(treblle): State<Treblle>,
    request: Request,
    next: Next,
) -> Response {
    if !treblle.is_enabled() {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let snapshot = RequestSnapshot::capture(&mut parts, treblle.client_ip_source()).await;
    let (request_body, body) = buffer_body(body, &parts.headers, treblle.max_body_size()).await;
    let request = Request::from_parts(parts, body);

    let timer = RequestTimer::start();
    let response = next.run(request).await;
    let load_time = timer.elapsed_ms();

    let (parts, body) = response.into_parts();
    let declared_size = body
        .size_hint()
        .exact()
        .or_else(|| content_length(&parts.headers));
    let (response_body, body) = buffer_body(body, &parts.headers, treblle.max_body_size()).await;

    let response_size = response_body
        .as_ref()
        .map(|bytes| bytes.len() as u64)
        .or(declared_size)
        .unwrap_or(0);

    tracing::trace!(
        target: TRACING_TARGET,
        method = %snapshot.method,
        url = %snapshot.url,
        status = parts.status.as_u16(),
        load_time_ms = load_time,
        response_size,
        "Request observed"
    );

    let observed = Observed {
        snapshot,
        timer,
        request_body,
        response_body,
        response_size,
        load_time,
    };
    if let Some(payload) = observed.into_payload(&treblle, &parts) {
        treblle.dispatch(payload);
    }

    Response::from_parts(parts, body)
}

/// Everything captured about one request/response cycle.
struct Observed {
    snapshot: RequestSnapshot,
    timer: RequestTimer,
    request_body: Option<Bytes>,
    response_body: Option<Bytes>,
    response_size: u64,
    load_time: f64,
}

impl Observed {
    fn into_payload(self, treblle: &Treblle, response: &ResponseParts) -> Option<Payload> {
        let sdk = treblle.sdk()?.clone();
        let fields = treblle.fields_to_mask();
        let snapshot = self.snapshot;

        let mut request_headers = snapshot.headers;
        mask_headers(&mut request_headers, fields);

        let mut body = request_payload(
            self.request_body.as_deref().unwrap_or_default(),
            snapshot.content_type.as_deref(),
            snapshot.query.as_deref(),
        );
        mask_in_place(&mut body, fields);

        let mut response_headers = header_map(&response.headers);
        mask_headers(&mut response_headers, fields);

        let ResponsePayload { payload, error } = response_payload(
            self.response_body.map_or(ResponseBody::Empty, ResponseBody::from),
            fields,
        );

        let request = RequestInfo {
            timestamp: format_timestamp(self.timer.received_at()),
            ip: snapshot.ip,
            url: snapshot.url,
            user_agent: snapshot.user_agent,
            method: snapshot.method,
            headers: request_headers,
            body,
        };

        let response = ResponseInfo {
            headers: response_headers,
            code: response.status.as_u16(),
            size: self.response_size,
            load_time: self.load_time,
            body: payload,
        };

        let payload = PayloadBuilder::new(sdk)
            .protocol(snapshot.protocol)
            .request(request)
            .response(response)
            .errors(error)
            .build();

        Some(payload)
    }
}

/// Buffers a body so it can be recorded and then replayed.
///
/// Only bodies with an exact size hint within `max_body_size` are read.
/// Event streams, bodies of unknown length and oversized bodies are passed
/// through untouched and not recorded.
async fn buffer_body(body: Body, headers: &HeaderMap, max_body_size: usize) -> (Option<Bytes>, Body) {
    if is_streaming(headers) {
        return (None, body);
    }

    let limit = max_body_size as u64;
    let Some(size) = body.size_hint().exact() else {
        return (None, body);
    };

    if size > limit || content_length(headers).is_some_and(|length| length > limit) {
        tracing::debug!(
            target: TRACING_TARGET,
            size,
            max_body_size,
            "Body exceeds the capture limit, passing through"
        );
        return (None, body);
    }

    match collect_body(body).await {
        Ok(bytes) => (Some(bytes.clone()), Body::from(bytes)),
        Err(replay) => (None, replay),
    }
}

/// Reads a body to the end.
///
/// On a read error the returned body yields the chunks read so far followed
/// by the error, so the failure still reaches the client.
async fn collect_body(body: Body) -> Result<Bytes, Body> {
    let mut stream = body.into_data_stream();
    let mut chunks = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => chunks.push(chunk),
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Failed to buffer body, replaying it unrecorded"
                );
                let replay = chunks.into_iter().map(Ok).chain([Err(error)]);
                return Err(Body::from_stream(futures::stream::iter(replay)));
            }
        }
    }

    match chunks.len() {
        0 => Ok(Bytes::new()),
        1 => Ok(chunks.swap_remove(0)),
        _ => Ok(Bytes::from(chunks.concat())),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::{Duration, Instant};

    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum_client_ip::ClientIpSource;
    use axum_test::TestServer;
    use futures::StreamExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use treblle_core::{
        Error, MockTransport, Payload, PayloadTransport, TransportResponse, TreblleConfig,
    };

    use super::collect_body;
    use crate::{RouterExt, Treblle};

    const WAIT: Duration = Duration::from_secs(2);

    async fn echo(axum::Json(body): axum::Json<Value>) -> axum::Json<Value> {
        axum::Json(body)
    }

    async fn slow() -> axum::Json<Value> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        axum::Json(json!({ "slow": true }))
    }

    /// Sends one chunk and then never finishes.
    async fn endless() -> Body {
        let chunks = futures::stream::iter([Ok::<_, io::Error>("chunk")]);
        Body::from_stream(chunks.chain(futures::stream::pending()))
    }

    /// Sends one chunk and then fails.
    async fn broken() -> Body {
        Body::from_stream(futures::stream::iter([
            Ok("partial"),
            Err(io::Error::other("upstream broke")),
        ]))
    }

    async fn secret_header() -> impl IntoResponse {
        ([("secret", "s3cr3t")], axum::Json(json!({ "ok": true })))
    }

    async fn events() -> impl IntoResponse {
        ([(CONTENT_TYPE, "text/event-stream")], "data: hello\n\n")
    }

    async fn large() -> String {
        "x".repeat(64)
    }

    fn app(treblle: Treblle) -> Router {
        Router::new()
            .route("/", get(|| async { axum::Json(json!({ "message": "Hello World" })) }))
            .route("/echo", post(echo))
            .route("/text", get(|| async { "plain text" }))
            .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
            .route("/slow", get(slow))
            .route("/endless", get(endless))
            .route("/broken", get(broken))
            .route("/secret-header", get(secret_header))
            .route("/events", get(events))
            .route("/large", get(large))
            .with_treblle(treblle)
    }

    fn server(config: TreblleConfig, transport: MockTransport) -> anyhow::Result<TestServer> {
        Ok(TestServer::new(app(Treblle::new(config, transport)))?)
    }

    fn config() -> TreblleConfig {
        TreblleConfig::new("api-key", "project-id")
    }

    #[tokio::test]
    async fn test_request_and_response_are_masked() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let config = config().with_additional_fields_to_mask(["x-session-token"]);
        let server = server(config, transport.clone())?;

        let response = server
            .post("/echo")
            .add_query_param("page", "2")
            .add_header("x-session-token", "abc")
            .json(&json!({ "user": "ana", "password": "hunter2" }))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "user": "ana", "password": "hunter2" }));

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];

        assert_eq!(payload.api_key, "api-key");
        assert_eq!(payload.project_id, "project-id");
        assert_eq!(payload.sdk, crate::SDK_NAME);

        let request = &payload.data.request;
        assert_eq!(request.method, "POST");
        assert!(request.url.ends_with("/echo?page=2"));
        assert_eq!(
            request.body,
            json!({ "user": "ana", "password": "*****", "page": "2" })
        );
        assert_eq!(request.headers["x-session-token"], "*****");

        let response = &payload.data.response;
        assert_eq!(response.code, 200);
        assert_eq!(
            response.body,
            Some(json!({ "user": "ana", "password": "*****" }))
        );
        assert!(response.size > 0);
        assert!(payload.data.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_non_json_response_records_invalid_json() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config(), transport.clone())?;

        let response = server.get("/text").await;
        response.assert_text("plain text");

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert!(data.response.body.is_none());
        assert_eq!(data.errors.len(), 1);
        assert!(data.errors[0].is_invalid_json());
        assert_eq!(data.request.body, json!({}));

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_response_records_no_error() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config(), transport.clone())?;

        server.get("/empty").await.assert_status(StatusCode::NO_CONTENT);

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert_eq!(data.response.code, 204);
        assert!(data.response.body.is_none());
        assert!(data.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_unmatched_route_is_observed() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config(), transport.clone())?;

        server
            .get("/missing")
            .expect_failure()
            .await
            .assert_status_not_found();

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        assert_eq!(payloads[0].data.response.code, 404);

        Ok(())
    }

    #[tokio::test]
    async fn test_failing_transport_does_not_affect_response() -> anyhow::Result<()> {
        let transport = MockTransport::failing();
        let server = server(config(), transport.clone())?;

        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "message": "Hello World" }));

        assert_eq!(transport.wait_for_payloads(1, WAIT).await.len(), 1);

        Ok(())
    }

    #[derive(Debug)]
    struct PanickingTransport;

    #[async_trait::async_trait]
    impl PayloadTransport for PanickingTransport {
        async fn send(&self, _payload: &Payload) -> Result<TransportResponse, Error> {
            panic!("transport exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_transport_does_not_affect_response() -> anyhow::Result<()> {
        let server = TestServer::new(app(Treblle::new(config(), PanickingTransport)))?;

        for _ in 0..2 {
            let response = server.get("/").await;
            response.assert_status_ok();
            response.assert_json(&json!({ "message": "Hello World" }));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_slow_transport_does_not_delay_response() -> anyhow::Result<()> {
        let transport = MockTransport::new().with_delay(Duration::from_millis(500));
        let server = server(config(), transport.clone())?;

        let started_at = Instant::now();
        server.get("/slow").await.assert_status_ok();
        assert!(started_at.elapsed() < Duration::from_millis(500));

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let load_time = payloads[0].data.response.load_time;
        assert!(load_time >= 50.0, "load_time was {load_time}");
        assert!(load_time < 500.0, "load_time was {load_time}");

        Ok(())
    }

    #[tokio::test]
    async fn test_forwarded_client_ip() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let treblle = Treblle::new(config(), transport.clone())
            .with_client_ip_source(ClientIpSource::RightmostXForwardedFor);
        let server = TestServer::new(app(treblle))?;

        server
            .get("/")
            .add_header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .add_header("user-agent", "integration-test")
            .await
            .assert_status_ok();

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let request = &payloads[0].data.request;
        assert_eq!(request.ip, "10.0.0.1");
        assert_eq!(request.user_agent, "integration-test");
        assert_eq!(request.timestamp.len(), "YYYY-MM-DD HH:MM:SS".len());

        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_recorded() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config().with_max_body_size(8), transport.clone())?;

        let body = json!({ "user": "ana", "password": "hunter2" });
        let response = server.post("/echo").json(&body).await;
        response.assert_json(&body);

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert_eq!(data.request.body, json!({}));
        assert!(data.response.body.is_none());
        assert!(data.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_unresolved_client_ip_is_bogon() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let treblle =
            Treblle::new(config(), transport.clone()).with_client_ip_source(ClientIpSource::XRealIp);
        let server = TestServer::new(app(treblle))?;

        server.get("/").await.assert_status_ok();

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        assert_eq!(payloads[0].data.request.ip, treblle_core::constants::UNKNOWN_IP);

        Ok(())
    }

    #[tokio::test]
    async fn test_endless_response_is_not_buffered() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let app = app(Treblle::new(config(), transport.clone()));

        let request = Request::builder().uri("/endless").body(Body::empty())?;
        let response =
            tokio::time::timeout(Duration::from_millis(500), app.oneshot(request)).await??;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_millis(500), body.next()).await?;
        assert_eq!(first.transpose()?, Some(Bytes::from_static(b"chunk")));

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert!(data.response.body.is_none());
        assert_eq!(data.response.size, 0);
        assert!(data.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_failing_response_body_reaches_client() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let app = app(Treblle::new(config(), transport.clone()));

        let request = Request::builder().uri("/broken").body(Body::empty())?;
        let response =
            tokio::time::timeout(Duration::from_millis(500), app.oneshot(request)).await??;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.transpose()?;
        assert_eq!(first, Some(Bytes::from_static(b"partial")));
        assert!(matches!(body.next().await, Some(Err(_))));

        assert_eq!(transport.wait_for_payloads(1, WAIT).await.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_collect_body_replays_read_error() {
        let body = Body::from_stream(futures::stream::iter([
            Ok("partial"),
            Err(io::Error::other("upstream broke")),
        ]));

        let Err(replay) = collect_body(body).await else {
            panic!("expected the read error to be replayed");
        };

        let mut replay = replay.into_data_stream();
        let first = replay.next().await.map(|chunk| chunk.ok());
        assert_eq!(first, Some(Some(Bytes::from_static(b"partial"))));

        let error = replay.next().await.and_then(|chunk| chunk.err());
        assert!(error.is_some_and(|error| error.to_string().contains("upstream broke")));
        assert!(replay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_body_joins_chunks() {
        let body = Body::from_stream(futures::stream::iter([
            Ok::<_, io::Error>("{\"a\":"),
            Ok("1}"),
        ]));

        let bytes = collect_body(body).await.ok();
        assert_eq!(bytes, Some(Bytes::from_static(b"{\"a\":1}")));
    }

    #[tokio::test]
    async fn test_sensitive_response_header_is_masked() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config(), transport.clone())?;

        let response = server.get("/secret-header").await;
        response.assert_status_ok();
        assert_eq!(response.header("secret"), "s3cr3t");

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let response = &payloads[0].data.response;
        assert_eq!(response.headers["secret"], "*****");
        assert_eq!(response.body, Some(json!({ "ok": true })));

        Ok(())
    }

    #[tokio::test]
    async fn test_event_stream_passes_through() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config(), transport.clone())?;

        let response = server.get("/events").await;
        response.assert_status_ok();
        response.assert_text("data: hello\n\n");

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert!(data.response.body.is_none());
        assert!(data.errors.is_empty());
        assert_eq!(data.response.size, "data: hello\n\n".len() as u64);

        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_response_is_not_recorded() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(config().with_max_body_size(16), transport.clone())?;

        let response = server.get("/large").await;
        response.assert_status_ok();
        response.assert_text("x".repeat(64));

        let payloads = transport.wait_for_payloads(1, WAIT).await;
        let data = &payloads[0].data;
        assert!(data.response.body.is_none());
        assert!(data.errors.is_empty());
        assert_eq!(data.response.size, 64);

        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_middleware_sends_nothing() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        let server = server(TreblleConfig::default(), transport.clone())?;

        server.get("/").await.assert_status_ok();

        let payloads = transport
            .wait_for_payloads(1, Duration::from_millis(100))
            .await;
        assert!(payloads.is_empty());

        Ok(())
    }
}
