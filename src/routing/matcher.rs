//! Service segment matching.
//!
//! # Responsibilities
//! - Split an inbound path into the service segment and the remaining path
//!
//! # Design Decisions
//! - Service matching is case-sensitive
//! - The remaining path is kept byte-for-byte (no decoding, no slash rewriting)
//! - No regex to guarantee O(n) matching

/// An inbound path split at its first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePath<'a> {
    /// Candidate service name (may be empty for `/`).
    pub service: &'a str,
    /// Everything after the service segment, starting at the next `/`, or empty.
    pub remaining: &'a str,
}

/// Split `/<service>[/<rest>]` into its service segment and remaining path.
pub fn split_service_path(path: &str) -> ServicePath<'_> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => ServicePath {
            service: &trimmed[..idx],
            remaining: &trimmed[idx..],
        },
        None => ServicePath {
            service: trimmed,
            remaining: "",
        },
    }
}
