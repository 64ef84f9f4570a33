//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection drives its own `SyncSession`; this module only translates
//! between protocol messages and session events.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Deserialize;
use std::sync::Arc;
use syllabus_core::{SessionError, SessionHandle, SyncSession, User};
use tracing::{error, info, warn};

/// Query parameters accepted on the upgrade request.
#[derive(Deserialize, Debug, Default)]
pub struct WsParams {
    /// The deep-link target, usually a breakdown id.
    pub chat: Option<String>,
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<WsParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user, params.chat))
}

async fn handle_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    user: User,
    target: Option<String>,
) {
    info!(user_id = %user.id, "New WebSocket connection established.");

    let (mut sender, mut receiver) = socket.split();
    let (handle, mut updates) =
        SyncSession::spawn(app_state.store.clone(), app_state.pipeline.clone());

    // --- 1. Initialization Phase ---
    // The target goes first so the first completed load already honors it.
    let user_id = user.id;
    if let Err(e) = initialize(&handle, target, user).await {
        error!("Failed to initialize sync session: {}", e);
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => {
                    if send_message(&mut sender, &ServerMessage::from(update)).await.is_err() {
                        info!("Client went away while sending.");
                        break;
                    }
                }
                None => {
                    warn!("Sync session ended before the connection.");
                    break;
                }
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_text_message(text.as_str(), &handle, &mut sender).await {
                        error!("Failed to forward client message: {}", e);
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
        }
    }

    // --- 3. Cleanup ---
    handle.shutdown();
    info!(%user_id, "WebSocket connection closed.");
}

async fn initialize(
    handle: &SessionHandle,
    target: Option<String>,
    user: User,
) -> Result<(), SessionError> {
    handle.set_target(target).await?;
    handle.set_identity(Some(user)).await
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    handle: &SessionHandle,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<(), SessionError> {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let reply = ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            };
            // A failed send surfaces on the next update.
            let _ = send_message(sender, &reply).await;
            return Ok(());
        }
    };

    match client_msg {
        ClientMessage::SetTarget { target } => handle.set_target(target).await,
        ClientMessage::Select { breakdown_id } => handle.select(breakdown_id).await,
        ClientMessage::Refresh => handle.refresh().await,
        ClientMessage::Upload { content } => handle.upload(content).await,
        ClientMessage::Uploaded { breakdown_id } => handle.uploaded(breakdown_id).await,
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
