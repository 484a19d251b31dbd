//! Request gateway for the scheduling services.
//!
//! Every request to `/<service>[/<rest>]` is forwarded to the upstream bound
//! to `<service>` and the upstream's response is relayed back unchanged.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
