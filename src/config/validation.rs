//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Service names usable as a single path segment, unique
//! - Upstreams are absolute plain-HTTP base addresses
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RouteConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route #{index}: service name is empty")]
    EmptyServiceName { index: usize },

    #[error("route '{service}': service name must be a single path segment")]
    ServiceNameHasSlash { service: String },

    #[error("route '{service}': declared more than once")]
    DuplicateService { service: String },

    #[error("route '{service}': invalid upstream '{upstream}': {reason}")]
    InvalidUpstream {
        service: String,
        upstream: String,
        reason: String,
    },

    #[error("timeouts.{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("limits.max_buffered_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a full gateway configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_routes(&config.routes).err().unwrap_or_default();

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "connect_secs" });
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "upstream_secs" });
    }
    if config.limits.max_buffered_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the route table alone.
pub fn validate_routes(routes: &[RouteConfig]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, route) in routes.iter().enumerate() {
        if route.service.is_empty() {
            errors.push(ValidationError::EmptyServiceName { index });
        } else if route.service.contains('/') {
            errors.push(ValidationError::ServiceNameHasSlash {
                service: route.service.clone(),
            });
        } else if !seen.insert(route.service.as_str()) {
            errors.push(ValidationError::DuplicateService {
                service: route.service.clone(),
            });
        }

        if let Err(reason) = check_upstream(&route.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                service: route.service.clone(),
                upstream: route.upstream.clone(),
                reason,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(upstream: &str) -> Result<(), String> {
    let url = Url::parse(upstream).map_err(|e| e.to_string())?;

    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}', only http is forwarded", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("base address must not carry a query or fragment".to_string());
    }
    Ok(())
}
