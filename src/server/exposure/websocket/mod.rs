//! WebSocket exposure carrying the dispatch event stream
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──▶ /ws?token=… ──▶ ws_handler() ──origin ok?──▶ handle_socket()
//!                                                                │
//!                                             Dispatcher::connect(conn_id, tx)
//!                                                                │
//!                      read loop ──decode──▶ Dispatcher::event ──▶ DispatchState
//!                                                                │
//!                      write loop ◀──────── per-connection mpsc ◀┘
//! ```
//!
//! See [`crate::core::events`] for the frame vocabulary.

mod handler;

use crate::server::host::ServerHost;
use anyhow::Result;
use axum::{Router, routing::get};
use std::sync::Arc;

/// WebSocket API exposure implementation
///
/// Consumes a `ServerHost` and produces an Axum router with a `/ws`
/// endpoint. Every accepted socket is attached to the host's dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerBuilder::new().build_host()?);
///
/// let rest_router = RestExposure::build_router(host.clone(), vec![])?;
/// let ws_router = WebSocketExposure::build_router(host)?;
///
/// let app = rest_router.merge(ws_router);
/// ```
pub struct WebSocketExposure;

impl WebSocketExposure {
    /// Build the WebSocket router from a host
    pub fn build_router(host: Arc<ServerHost>) -> Result<Router> {
        let router = Router::new()
            .route("/ws", get(handler::ws_handler))
            .with_state(host);

        Ok(router)
    }
}
