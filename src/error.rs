//! Gateway-originated failures.
//!
//! Every variant is resolved locally into a JSON response of the form
//! `{"message": "..."}`. Upstream error statuses are not represented here:
//! they are relayed verbatim as successful proxy operations.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::DeadlineExceeded;

/// Message returned for every outbound failure. Transport details stay in the logs.
pub const UNAVAILABLE_MESSAGE: &str = "Service unavailable";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// First path segment has no entry in the route table.
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    /// No response was received from the upstream (refused, DNS, reset).
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[source] hyper_util::client::legacy::Error),

    /// The upstream did not produce a response head in time.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// Remaining path and query could not be attached to the upstream base.
    #[error("invalid upstream uri: {0}")]
    InvalidUpstreamUri(#[from] axum::http::uri::InvalidUri),

    /// Outbound request could not be assembled from the inbound parts.
    #[error("failed to build upstream request: {0}")]
    RequestBuild(#[from] axum::http::Error),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed JSON body: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnreachable(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::InvalidUpstreamUri(_)
            | GatewayError::RequestBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MalformedJson(_) | GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message placed in the response body.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::ServiceNotFound(_) => self.to_string(),
            GatewayError::UpstreamUnreachable(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::InvalidUpstreamUri(_)
            | GatewayError::RequestBuild(_) => UNAVAILABLE_MESSAGE.to_string(),
            GatewayError::PayloadTooLarge { .. } => "Request body too large".to_string(),
            GatewayError::MalformedJson(_) => "Malformed JSON body".to_string(),
            GatewayError::BodyRead(_) => "Invalid request body".to_string(),
        }
    }
}

impl From<DeadlineExceeded> for GatewayError {
    fn from(err: DeadlineExceeded) -> Self {
        GatewayError::UpstreamTimeout(err.0)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "message": self.client_message() }));
        (self.status(), body).into_response()
    }
}
