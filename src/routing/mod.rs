//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → matcher.rs (split `/<service>` from the remaining path)
//!     → router.rs (exact lookup of the service name)
//!     → Return: matched Route or miss
//!
//! Route Compilation (at startup or reload):
//!     RouteConfig[]
//!     → Validate (unique names, http upstreams)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Reloads publish a whole new table; never mutated in place
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{split_service_path, ServicePath};
pub use router::{Route, RouteTable};
