//! WebSocket upgrade handler and message loop
//!
//! Each accepted connection gets:
//!
//! 1. A welcome message with its unique connection ID
//! 2. A read loop that decodes client frames and hands them to the dispatcher
//! 3. A write loop that forwards dispatcher output to the WebSocket

use crate::core::events::{ClientEvent, ServerEvent};
use crate::core::model::ConnectionId;
use crate::dispatch::Dispatcher;
use crate::server::host::ServerHost;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header::ORIGIN};
use axum::response::{IntoResponse, Response};
use futures::SinkExt;
use futures::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Credential checked when the connection identifies
    pub token: Option<String>,
}

/// WebSocket upgrade handler for GET /ws
///
/// Browsers always send `Origin`; a disallowed one is refused before the
/// upgrade. Non-browser clients without the header are let through.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<ConnectParams>,
    State(host): State<Arc<ServerHost>>,
) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|o| host.config().is_origin_allowed(o));
        if !allowed {
            tracing::warn!(origin = ?origin, "WebSocket upgrade refused for origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let dispatcher = host.dispatcher().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, dispatcher, params.token))
}

/// Handle a single WebSocket connection
///
/// This function:
/// 1. Attaches the connection to the dispatcher
/// 2. Sends a Welcome message with the connection ID
/// 3. Spawns a write loop that forwards ServerEvents to the WebSocket
/// 4. Runs the read loop that feeds client events to the dispatcher
/// 5. Detaches on disconnect
async fn handle_socket(socket: WebSocket, dispatcher: Dispatcher, credential: Option<String>) {
    let conn_id = ConnectionId::generate();
    let (tx, mut server_rx) = mpsc::unbounded_channel::<ServerEvent>();

    if dispatcher
        .connect(conn_id.clone(), tx, credential)
        .await
        .is_err()
    {
        tracing::error!(connection_id = %conn_id, "Dispatcher unavailable, dropping connection");
        return;
    }
    tracing::debug!(connection_id = %conn_id, "WebSocket client connected");

    // Split the WebSocket into read and write halves
    let (mut ws_write, mut ws_read) = socket.split();

    // Send welcome message
    let welcome = ServerEvent::Welcome {
        connection_id: conn_id.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&welcome)
        && ws_write.send(Message::Text(json.into())).await.is_err()
    {
        let _ = dispatcher.disconnect(conn_id).await;
        return;
    }

    let conn_id_write = conn_id.clone();

    // Spawn write loop: forward ServerEvents from the dispatcher to the WebSocket
    let write_handle = tokio::spawn(async move {
        while let Some(event) = server_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_write.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!(
                            connection_id = %conn_id_write,
                            "WebSocket write failed, closing"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %conn_id_write,
                        event = event.name(),
                        error = %e,
                        "Failed to serialize ServerEvent"
                    );
                }
            }
        }
    });

    // Read loop: decode client frames and queue them on the dispatcher
    while let Some(result) = ws_read.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let Some(event) = decode(&conn_id, &text) else {
                    continue;
                };
                if dispatcher.event(conn_id.clone(), event).await.is_err() {
                    tracing::error!(connection_id = %conn_id, "Dispatcher stopped, closing connection");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %conn_id, "Client sent close frame");
                break;
            }
            Ok(Message::Ping(_)) => {
                // axum handles pong automatically
            }
            Ok(_) => {
                // Ignore binary and other message types
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %conn_id,
                    error = %e,
                    "WebSocket read error"
                );
                break;
            }
        }
    }

    // Cleanup
    write_handle.abort();
    let _ = dispatcher.disconnect(conn_id.clone()).await;
    tracing::debug!(connection_id = %conn_id, "WebSocket client disconnected");
}

/// Parse one text frame; malformed frames are logged and dropped
fn decode(connection_id: &ConnectionId, text: &str) -> Option<ClientEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "Dropping malformed client frame"
            );
            None
        }
    }
}
