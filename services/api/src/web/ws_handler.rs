//! services/api/src/web/ws_handler.rs
//!
//! The live activity feed over WebSocket. Each connection runs a forwarding
//! task that pushes new activities of the user and their friends; the task is
//! cancelled as soon as the client goes away.

use crate::web::{
    feed::ActivityResponse,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

/// Serializes and sends one message. Returns false once the client is gone.
async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New feed connection established for user: {}", user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Subscribe before confirming, so nothing recorded after `Subscribed` is missed ---
    let mut activities = app_state.feed.subscribe();
    if !send_message(&ws_sender, &ServerMessage::Subscribed { user_id }).await {
        error!("Failed to send subscription confirmation.");
        return;
    }

    // --- 2. Forwarding task ---
    let token = CancellationToken::new();
    let forward_task = {
        let app_state = app_state.clone();
        let ws_sender = ws_sender.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = activities.next() => {
                        let Some(activity) = next else { break };
                        match app_state.feed.is_visible_to(&activity, user_id).await {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(e) => {
                                warn!("Failed to check feed visibility for {}: {}", user_id, e);
                                continue;
                            }
                        }
                        let message = ServerMessage::Activity {
                            activity: ActivityResponse::from(activity),
                        };
                        if !send_message(&ws_sender, &message).await {
                            debug!("Feed client {} went away.", user_id);
                            break;
                        }
                    }
                }
            }
        })
    };

    // --- 3. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    if !send_message(&ws_sender, &ServerMessage::Pong).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to deserialize client message: {}", e);
                    let reply = ServerMessage::Error {
                        message: format!("Invalid message: {}", e),
                    };
                    if !send_message(&ws_sender, &reply).await {
                        break;
                    }
                }
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 4. Cleanup ---
    token.cancel();
    if let Err(e) = forward_task.await {
        error!("Feed forwarding task failed: {:?}", e);
    }
    info!("Feed connection closed for user: {}", user_id);
}
