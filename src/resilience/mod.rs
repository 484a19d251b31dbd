//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (idle deadline: upload progress, then the response head)
//!     → On expiry: request dropped, caller answers 500 "Service unavailable"
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - Exactly one forwarding attempt per inbound request; no retries, no circuit breaking

pub mod timeouts;

pub use timeouts::{with_idle_timeout, DeadlineExceeded};
