//! Server module: host, exposures and the builder that wires them
//!
//! `ServerBuilder` validates the configuration, spawns the dispatcher and
//! serves:
//! - the WebSocket endpoint (`/ws`) carrying the dispatch event stream
//! - read-only status routes over HTTP
//! - health check routes

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::{ServerBuilder, build_cors_layer};
pub use exposure::{RestExposure, WebSocketExposure};
pub use host::ServerHost;
