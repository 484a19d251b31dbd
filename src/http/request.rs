//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) when the client sent none
//! - Decide the body transfer mode from the inbound Content-Type
//! - Read buffered bodies under a size limit, pass streamed bodies through
//! - Prepare request for forwarding to the upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body mode is decided once per request, never from body content or method
//! - Multipart bodies are never read or re-encoded here

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tower_http::request_id::{MakeRequestId, RequestId, SetRequestIdLayer};
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::error::GatewayError;
use crate::routing::{split_service_path, Route};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Layer that stamps every inbound request with an `x-request-id`.
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuidV4> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4)
}

/// Request ID of an inbound request, or "unknown".
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// How the inbound body travels to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Read fully, JSON re-serialized, forwarded with a recomputed length.
    Buffered,
    /// Inbound byte stream piped to the upstream as-is.
    Streamed,
}

impl BodyMode {
    /// `Streamed` for `multipart/form-data`, `Buffered` for everything else.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match media_type(headers) {
            Some(media) if media.eq_ignore_ascii_case("multipart/form-data") => BodyMode::Streamed,
            _ => BodyMode::Buffered,
        }
    }
}

/// Content-Type without its parameters.
fn media_type(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    value.split(';').next().map(str::trim)
}

fn is_json(media: &str) -> bool {
    let media = media.to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

/// A fully read inbound body.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferedBody {
    Empty,
    Json(Value),
    Raw(Bytes),
}

/// Inbound body in the representation selected by [`BodyMode`].
#[derive(Debug)]
pub enum ProxiedBody {
    Streamed(Body),
    Buffered(BufferedBody),
}

impl ProxiedBody {
    pub fn mode(&self) -> BodyMode {
        match self {
            ProxiedBody::Streamed(_) => BodyMode::Streamed,
            ProxiedBody::Buffered(_) => BodyMode::Buffered,
        }
    }

    /// Outbound body. A streamed body keeps the inbound size hint, so hyper
    /// sends an exact Content-Length when the client declared one and
    /// chunked transfer-encoding otherwise.
    pub fn into_body(self) -> Body {
        match self {
            ProxiedBody::Streamed(body) => body,
            ProxiedBody::Buffered(BufferedBody::Empty) => Body::empty(),
            ProxiedBody::Buffered(BufferedBody::Json(value)) => Body::from(value.to_string()),
            ProxiedBody::Buffered(BufferedBody::Raw(bytes)) => Body::from(bytes),
        }
    }
}

/// Outbound body that notifies `progress` each time the transport pulls a frame.
struct ProgressBody {
    inner: Body,
    progress: Arc<Notify>,
}

impl HttpBody for ProgressBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let frame = Pin::new(&mut self.inner).poll_frame(cx);
        if frame.is_ready() {
            self.progress.notify_one();
        }
        frame
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wrap an outbound body so sending it reports progress.
///
/// Size hint and end-of-stream pass through, so Content-Length handling is
/// unchanged.
pub fn with_send_progress(body: Body) -> (Body, Arc<Notify>) {
    let progress = Arc::new(Notify::new());
    let body = Body::new(ProgressBody {
        inner: body,
        progress: progress.clone(),
    });
    (body, progress)
}

/// Read a buffered-mode body, parsing JSON media types.
pub async fn read_buffered(
    body: Body,
    headers: &HeaderMap,
    limit: usize,
) -> Result<BufferedBody, GatewayError> {
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => return Err(GatewayError::PayloadTooLarge { limit }),
        Err(e) => return Err(GatewayError::BodyRead(e.to_string())),
    };

    if bytes.is_empty() {
        return Ok(BufferedBody::Empty);
    }

    if media_type(headers).is_some_and(is_json) {
        serde_json::from_slice(&bytes)
            .map(BufferedBody::Json)
            .map_err(GatewayError::MalformedJson)
    } else {
        Ok(BufferedBody::Raw(bytes))
    }
}

/// Inbound headers minus `Host` and `Content-Length`.
pub fn forwardable_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers
}

/// Per-call view of an inbound request matched to a service.
#[derive(Debug)]
pub struct ProxiedRequest {
    pub method: Method,
    pub service: String,
    pub remaining_path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: ProxiedBody,
}

impl ProxiedRequest {
    /// Consume an inbound request already matched to `route`.
    pub async fn from_inbound(
        request: Request<Body>,
        route: &Route,
        limits: &LimitsConfig,
    ) -> Result<Self, GatewayError> {
        let (parts, body) = request.into_parts();

        let remaining_path = split_service_path(parts.uri.path()).remaining.to_string();
        let query = parts.uri.query().map(str::to_string);

        let body = match BodyMode::from_headers(&parts.headers) {
            BodyMode::Streamed => ProxiedBody::Streamed(body),
            BodyMode::Buffered => ProxiedBody::Buffered(
                read_buffered(body, &parts.headers, limits.max_buffered_body_bytes).await?,
            ),
        };

        Ok(Self {
            method: parts.method,
            service: route.service().to_string(),
            remaining_path,
            query,
            headers: forwardable_headers(parts.headers),
            body,
        })
    }

    /// Build the outbound request against `route`'s upstream.
    ///
    /// A buffered body has an exact length, so any inbound chunked framing is
    /// dropped and hyper sends Content-Length instead.
    pub fn into_upstream_request(self, route: &Route) -> Result<Request<Body>, GatewayError> {
        let uri = route.upstream_uri(&self.remaining_path, self.query.as_deref())?;

        let mut headers = self.headers;
        if let ProxiedBody::Buffered(_) = self.body {
            headers.remove(TRANSFER_ENCODING);
        }

        let mut builder = Request::builder().method(self.method).uri(uri);
        if let Some(slot) = builder.headers_mut() {
            *slot = headers;
        }

        Ok(builder.body(self.body.into_body())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::routing::RouteTable;
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    fn appointments() -> Route {
        RouteTable::from_config(&[RouteConfig::new(
            "appointments",
            "http://localhost:3002/appointments",
        )])
        .unwrap()
        .resolve("appointments")
        .cloned()
        .unwrap()
    }

    #[test]
    fn multipart_is_streamed() {
        assert_eq!(
            BodyMode::from_headers(&headers("multipart/form-data; boundary=----abc")),
            BodyMode::Streamed
        );
        assert_eq!(
            BodyMode::from_headers(&headers("Multipart/Form-Data;boundary=x")),
            BodyMode::Streamed
        );
    }

    #[test]
    fn everything_else_is_buffered() {
        assert_eq!(BodyMode::from_headers(&HeaderMap::new()), BodyMode::Buffered);
        assert_eq!(BodyMode::from_headers(&headers("application/json")), BodyMode::Buffered);
        assert_eq!(BodyMode::from_headers(&headers("multipart/mixed; boundary=x")), BodyMode::Buffered);
        assert_eq!(
            BodyMode::from_headers(&headers("application/x-www-form-urlencoded")),
            BodyMode::Buffered
        );
    }

    #[test]
    fn host_and_length_are_dropped() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("gateway:3000"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert("authorization", HeaderValue::from_static("Bearer t"));
        inbound.append("cookie", HeaderValue::from_static("a=1"));
        inbound.append("cookie", HeaderValue::from_static("b=2"));

        let forwarded = forwardable_headers(inbound);
        assert!(forwarded.get(HOST).is_none());
        assert!(forwarded.get(CONTENT_LENGTH).is_none());
        assert_eq!(forwarded["authorization"], "Bearer t");
        assert_eq!(forwarded.get_all("cookie").iter().count(), 2);
    }

    #[tokio::test]
    async fn json_is_parsed_with_key_order() {
        let body = Body::from(r#"{ "title": "X",  "_id": "abc" }"#);
        let read = read_buffered(body, &headers("application/json; charset=utf-8"), 1024)
            .await
            .unwrap();
        let BufferedBody::Json(value) = read else {
            panic!("expected json body");
        };
        assert_eq!(value, json!({ "title": "X", "_id": "abc" }));
        assert_eq!(value.to_string(), r#"{"title":"X","_id":"abc"}"#);
    }

    #[tokio::test]
    async fn non_json_is_kept_raw() {
        let body = Body::from("name=a&email=b");
        let read = read_buffered(body, &headers("application/x-www-form-urlencoded"), 1024)
            .await
            .unwrap();
        assert_eq!(read, BufferedBody::Raw(Bytes::from_static(b"name=a&email=b")));
    }

    #[tokio::test]
    async fn empty_body_skips_parsing() {
        let read = read_buffered(Body::empty(), &headers("application/json"), 1024)
            .await
            .unwrap();
        assert_eq!(read, BufferedBody::Empty);
    }

    #[tokio::test]
    async fn oversized_and_malformed_bodies_are_rejected() {
        let err = read_buffered(Body::from(vec![b'a'; 64]), &HeaderMap::new(), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { limit: 16 }));

        let err = read_buffered(Body::from("{\"a\":"), &headers("application/json"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn builds_upstream_request() {
        let route = appointments();
        let inbound = Request::builder()
            .method(Method::PATCH)
            .uri("/appointments/42/status?notify=true")
            .header(HOST, "gateway:3000")
            .header(CONTENT_TYPE, "application/json")
            .header("x-custom", "1")
            .body(Body::from(r#"{"status":"done"}"#))
            .unwrap();

        let proxied = ProxiedRequest::from_inbound(inbound, &route, &LimitsConfig::default())
            .await
            .unwrap();
        assert_eq!(proxied.service, "appointments");
        assert_eq!(proxied.remaining_path, "/42/status");
        assert_eq!(proxied.query.as_deref(), Some("notify=true"));
        assert_eq!(proxied.body.mode(), BodyMode::Buffered);

        let outbound = proxied.into_upstream_request(&route).unwrap();
        assert_eq!(outbound.method(), Method::PATCH);
        assert_eq!(
            outbound.uri(),
            "http://localhost:3002/appointments/42/status?notify=true"
        );
        assert!(outbound.headers().get(HOST).is_none());
        assert_eq!(outbound.headers()["x-custom"], "1");

        let bytes = axum::body::to_bytes(outbound.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"status":"done"}"#);
    }

    #[tokio::test]
    async fn multipart_body_passes_through_untouched() {
        let route = appointments();
        let raw = "--b\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\n{not json\r\n--b--\r\n";
        let inbound = Request::builder()
            .method(Method::POST)
            .uri("/appointments/upload")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=b")
            .body(Body::from(raw))
            .unwrap();

        let proxied = ProxiedRequest::from_inbound(inbound, &route, &LimitsConfig { max_buffered_body_bytes: 1 })
            .await
            .unwrap();
        assert_eq!(proxied.body.mode(), BodyMode::Streamed);

        let outbound = proxied.into_upstream_request(&route).unwrap();
        assert_eq!(
            outbound.headers()[CONTENT_TYPE],
            "multipart/form-data; boundary=b"
        );
        let bytes = axum::body::to_bytes(outbound.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], raw.as_bytes());
    }

    #[tokio::test]
    async fn buffered_body_drops_chunked_framing() {
        let route = appointments();
        let inbound = Request::builder()
            .method(Method::POST)
            .uri("/appointments")
            .header(CONTENT_TYPE, "application/json")
            .header(TRANSFER_ENCODING, "chunked")
            .body(Body::from(r#"{ "a" : 1 }"#))
            .unwrap();

        let proxied = ProxiedRequest::from_inbound(inbound, &route, &LimitsConfig::default())
            .await
            .unwrap();
        let outbound = proxied.into_upstream_request(&route).unwrap();

        assert!(outbound.headers().get(TRANSFER_ENCODING).is_none());
        assert_eq!(outbound.body().size_hint().exact(), Some(7));
    }

    #[tokio::test]
    async fn streamed_body_keeps_chunked_framing() {
        let route = appointments();
        let inbound = Request::builder()
            .method(Method::POST)
            .uri("/appointments/upload")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=b")
            .header(TRANSFER_ENCODING, "chunked")
            .body(Body::from("--b--\r\n"))
            .unwrap();

        let proxied = ProxiedRequest::from_inbound(inbound, &route, &LimitsConfig::default())
            .await
            .unwrap();
        let outbound = proxied.into_upstream_request(&route).unwrap();

        assert_eq!(outbound.headers()[TRANSFER_ENCODING], "chunked");
    }

    #[tokio::test]
    async fn send_progress_is_reported_per_frame() {
        let (body, progress) = with_send_progress(Body::from("payload"));
        assert_eq!(body.size_hint().exact(), Some(7));

        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"payload");

        // A permit is left behind even though nobody was waiting.
        tokio::time::timeout(std::time::Duration::from_secs(1), progress.notified())
            .await
            .unwrap();
    }
}
