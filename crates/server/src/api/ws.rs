//! WebSocket stream of live ticket snapshots.
//!
//! A connection subscribes to the caller's collection on upgrade, receives
//! the current snapshot immediately, then a fresh snapshot after every
//! mutation until it closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use ticketdesk_core::{Subscription, Ticket, UserId};
use tracing::{debug, error, info, warn};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_SNAPSHOTS_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage<'a> {
    /// The full ordered collection after the latest mutation.
    Snapshot { version: u64, tickets: &'a [Ticket] },
}

/// WebSocket upgrade handler.
///
/// The subscription is registered before upgrading so a backend failure is
/// still reported as an HTTP error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let subscription = state.engine().subscribe(&user_id).await?;
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, user_id, subscription))
        .into_response())
}

/// Handle a single WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: UserId,
    mut subscription: Subscription,
) {
    let (mut sender, mut receiver) = socket.split();
    let handle = subscription.handle();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!(user_id = %user_id, subscription = %handle.id(), "WebSocket client connected");

    // Forward snapshots to this client until unsubscribed or disconnected
    let mut send_task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.recv().await {
            let message = WsMessage::Snapshot {
                version: snapshot.version,
                tickets: &snapshot.tickets,
            };
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        return;
                    }
                    WS_SNAPSHOTS_SENT.inc();
                }
                Err(e) => {
                    error!("Failed to serialize snapshot: {}", e);
                }
            }
        }
        // The engine ended the stream (shutdown or unsubscribe)
        debug!("Snapshot stream ended, closing socket");
        let _ = sender.send(Message::Close(None)).await;
    });

    // Handle incoming messages from client (ping/pong, close)
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("WebSocket client requested close");
                    break;
                }
                Ok(Message::Text(text)) => {
                    // Clients only listen; writes go through the REST routes
                    debug!("Ignoring text message: {}", text);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    // Whichever side finishes first ends the connection
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.engine().unsubscribe(&handle).await;
    WS_CONNECTIONS_ACTIVE.dec();
    info!(user_id = %user_id, "WebSocket client disconnected");
}
