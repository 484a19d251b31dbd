//! Route lookup.
//!
//! # Responsibilities
//! - Store the service name → upstream bindings
//! - Resolve a service segment to its route or an explicit miss
//! - Build the outbound URI for a matched route
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact lookup via HashMap, case-sensitive
//! - Explicit miss rather than silent default; no partial or fallback routing

use axum::http::uri::{InvalidUri, Uri};
use std::collections::HashMap;

use crate::config::validation::{validate_routes, ValidationError};
use crate::config::RouteConfig;

/// A compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    service: String,
    upstream: String,
}

impl Route {
    /// Service name this route answers to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Upstream base address without a trailing slash.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Reattach the remaining path and query to the upstream base address.
    pub fn upstream_uri(&self, remaining: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let mut target = String::with_capacity(
            self.upstream.len() + remaining.len() + query.map_or(0, |q| q.len() + 1),
        );
        target.push_str(&self.upstream);
        target.push_str(remaining);
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        Uri::try_from(target)
    }
}

/// Immutable service name → route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Build the table from configuration, rejecting invalid route sets.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, Vec<ValidationError>> {
        validate_routes(routes)?;

        let routes = routes
            .iter()
            .map(|r| {
                let route = Route {
                    service: r.service.clone(),
                    upstream: r.upstream.trim_end_matches('/').to_string(),
                };
                (r.service.clone(), route)
            })
            .collect();

        Ok(Self { routes })
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, service: &str) -> Option<&Route> {
        self.routes.get(service)
    }

    /// Configured service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
