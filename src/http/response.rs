//! Response relay.
//!
//! # Responsibilities
//! - Hand the upstream response back to the client unchanged
//! - Stream the body frame by frame instead of buffering it
//! - Log transfer failures that happen after the head was sent
//!
//! # Design Decisions
//! - Status and headers are never rewritten, any status is a successful relay
//! - The body keeps its size hint and trailers
//! - Once the head is out, a mid-stream failure can only cut the connection

use axum::body::Body;
use axum::response::Response;
use http_body_util::BodyExt;
use hyper::body::Incoming;

/// Turn an upstream response into the client response.
pub fn relay(upstream: hyper::Response<Incoming>, service: &str, request_id: &str) -> Response {
    let service = service.to_string();
    let request_id = request_id.to_string();

    let (parts, body) = upstream.into_parts();
    let body = body.map_err(move |e| {
        tracing::warn!(
            request_id = %request_id,
            service = %service,
            error = %e,
            "Upstream response stream failed"
        );
        e
    });

    Response::from_parts(parts, Body::new(body))
}
