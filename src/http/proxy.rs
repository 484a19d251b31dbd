//! The forwarding handler.
//!
//! Per request: `Received → Matched | NotFound`, then
//! `Matched → Forwarding → BackendResponded | BackendUnreachable`.
//! A single forwarding attempt is made. If the client goes away, axum drops
//! this future and with it the in-flight upstream call.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use std::time::Instant;

use crate::error::GatewayError;
use crate::http::request::{request_id, with_send_progress, ProxiedRequest};
use crate::http::response::relay;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::with_idle_timeout;
use crate::routing::{split_service_path, Route};

/// Service label used when no route matched.
const UNMATCHED: &str = "none";

/// Main proxy handler.
/// Resolves the service, forwards the request, relays the response.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    // Snapshot; a concurrent reload does not affect this request.
    let routes = state.routes.load_full();
    let service = split_service_path(&path).service;

    let Some(route) = routes.resolve(service) else {
        tracing::warn!(request_id = %request_id, service = %service, "Service not found");
        let err = GatewayError::ServiceNotFound(service.to_string());
        metrics::record_request(method.as_str(), err.status().as_u16(), UNMATCHED, start_time);
        return err.into_response();
    };

    match forward(&state, route, request, &request_id).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                service = %route.service(),
                status = %response.status(),
                "Upstream responded"
            );
            metrics::record_request(
                method.as_str(),
                response.status().as_u16(),
                route.service(),
                start_time,
            );
            response
        }
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!(
                    request_id = %request_id,
                    service = %route.service(),
                    upstream = %route.upstream(),
                    error = ?err,
                    "Upstream request failed"
                );
            } else {
                tracing::warn!(
                    request_id = %request_id,
                    service = %route.service(),
                    error = %err,
                    "Request rejected"
                );
            }
            metrics::record_request(method.as_str(), status.as_u16(), route.service(), start_time);
            err.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    route: &Route,
    request: Request<Body>,
    request_id: &str,
) -> Result<Response, GatewayError> {
    let proxied = ProxiedRequest::from_inbound(request, route, &state.limits).await?;
    let mode = proxied.body.mode();

    let outbound = proxied.into_upstream_request(route)?;

    tracing::debug!(
        request_id = %request_id,
        upstream = %outbound.uri(),
        body_mode = ?mode,
        "Forwarding to upstream"
    );

    // Deadline restarts on every request body frame the transport pulls.
    let (parts, body) = outbound.into_parts();
    let (body, progress) = with_send_progress(body);
    let outbound = Request::from_parts(parts, body);

    let response = with_idle_timeout(
        state.upstream_timeout,
        &progress,
        state.client.request(outbound),
    )
    .await?
    .map_err(GatewayError::UpstreamUnreachable)?;

    Ok(relay(response, route.service(), request_id))
}
