//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → proxy.rs (resolve service, single forwarding attempt)
//!     → request.rs (body mode, headers, outbound request)
//!     → upstream via hyper-util client
//!     → response.rs (streamed relay)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{BodyMode, BufferedBody, ProxiedBody, ProxiedRequest, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
