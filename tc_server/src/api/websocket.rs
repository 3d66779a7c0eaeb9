//! WebSocket handler: one connection per session.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws?username=<name>`
//! 2. Server assigns a user id and registers a [`Session`]
//! 3. A send task drains the session's outbound queue into text frames
//! 4. Incoming text frames are parsed as [`ClientMessage`] and dispatched
//! 5. On disconnect the session is unregistered and leaves every table
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws?username=alice');
//!
//! ws.send(JSON.stringify({ type: "table_create", name: "Friday" }));
//! ws.send(JSON.stringify({ type: "chat", msg: "hi all", room: "table1" }));
//! ws.send(JSON.stringify({ type: "chat_typing", table_id: 1 }));
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tablechat::{Access, ChatRequest, Session, TableId, TerminateRequest};
use tokio::sync::mpsc;

use super::AppState;
use crate::logging;

/// Maximum username length in characters
pub const MAX_USERNAME_LENGTH: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    username: String,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat in the lobby or a table room
    Chat { msg: String, room: String },
    /// A keystroke in a table's chat box
    ChatTyping { table_id: TableId },
    /// Ask to end the game at a table
    TableTerminate { table_id: TableId },
    TableCreate {
        name: String,
        #[serde(default)]
        replay: bool,
    },
    TableJoin { table_id: TableId },
    TableSpectate { table_id: TableId },
    TableLeave { table_id: TableId },
    TableStart { table_id: TableId },
}

impl ClientMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::ChatTyping { .. } => "chat_typing",
            Self::TableTerminate { .. } => "table_terminate",
            Self::TableCreate { .. } => "table_create",
            Self::TableJoin { .. } => "table_join",
            Self::TableSpectate { .. } => "table_spectate",
            Self::TableLeave { .. } => "table_leave",
            Self::TableStart { .. } => "table_start",
        }
    }

    /// Table the message targets, if it names one
    pub fn table_id(&self) -> Option<TableId> {
        match self {
            Self::Chat { .. } | Self::TableCreate { .. } => None,
            Self::ChatTyping { table_id }
            | Self::TableTerminate { table_id }
            | Self::TableJoin { table_id }
            | Self::TableSpectate { table_id }
            | Self::TableLeave { table_id }
            | Self::TableStart { table_id } => Some(*table_id),
        }
    }
}

/// Upgrade an HTTP connection to a chat session.
///
/// # Query Parameters
///
/// - `username`: Display name, 1 to 32 characters after trimming
///
/// # Response
///
/// On success, upgrades to the WebSocket protocol (101 Switching Protocols).
/// An unusable username returns `400 Bad Request`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let username = query.username.trim().to_string();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return (StatusCode::BAD_REQUEST, "Invalid username").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, username, state))
}

/// Drive an established connection until the client goes away.
async fn handle_socket(socket: WebSocket, username: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = state.next_user_id();
    let (tx, mut rx) = mpsc::channel(state.outbound_buffer);
    let session = Arc::new(Session::new(user_id, username.as_str(), tx));
    state.sessions.register(session.clone()).await;
    logging::log_connection_event("connected", user_id, &username);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Failed to serialize {}: {}", message, e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(client_msg, &session, &state).await,
                Err(e) => {
                    logging::log_rejected_message(user_id, &e.to_string());
                    session.warning("Invalid message format.");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                log::warn!("WebSocket error for user {}: {}", user_id, e);
                break;
            }
            _ => {}
        }
    }

    state.sessions.unregister(user_id).await;
    state.lifecycle.disconnect(&session).await;
    send_task.abort();

    logging::log_connection_event("disconnected", user_id, &username);
}

/// Dispatch one client message to the service that owns it.
///
/// Outcomes reach the client through its session, never as a return value.
///
/// # Arguments
///
/// * `msg` - The parsed message
/// * `session` - The sender
/// * `state` - Shared services
pub async fn handle_client_message(msg: ClientMessage, session: &Arc<Session>, state: &AppState) {
    logging::log_client_request(msg.kind(), session.user_id(), msg.table_id());

    match msg {
        ClientMessage::Chat { msg, room } => {
            state
                .chat
                .chat(Some(session), ChatRequest::user(msg, room))
                .await;
        }
        ClientMessage::ChatTyping { table_id } => {
            state.typing.report(session, table_id, Access::Lock).await;
        }
        ClientMessage::TableTerminate { table_id } => {
            state
                .termination
                .terminate(
                    Some(session),
                    TerminateRequest {
                        table_id,
                        server: false,
                    },
                    Access::Lock,
                )
                .await;
        }
        ClientMessage::TableCreate { name, replay } => {
            state.lifecycle.create(session, &name, replay).await;
        }
        ClientMessage::TableJoin { table_id } => state.lifecycle.join(session, table_id).await,
        ClientMessage::TableSpectate { table_id } => {
            state.lifecycle.spectate(session, table_id).await;
        }
        ClientMessage::TableLeave { table_id } => state.lifecycle.leave(session, table_id).await,
        ClientMessage::TableStart { table_id } => state.lifecycle.start(session, table_id).await,
    }
}
