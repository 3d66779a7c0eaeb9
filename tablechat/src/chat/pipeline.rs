//! The chat pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    commands::{ChatCommandHandler, parse_chat_command},
    errors::ChatError,
    room::{LOBBY_ROOM, TABLE_ROOM_PREFIX, is_valid_room, parse_table_room},
    sanitize::{PreparedChat, Sanitizer, StrictPolicy, sanitize_chat_input},
};
use crate::{
    bridge::{ChatBridge, relay_text},
    constants::SERVER_USER_ID,
    db::ChatLogRepository,
    errors::report,
    messages::{ChatMessage, ServerMessage},
    session::{Session, SessionDirectory},
    table::{Access, LockedTable, TableChatMessage, TableRegistry},
};

/// An inbound chat message
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatRequest {
    pub msg: String,
    pub room: String,
    /// Display name; taken from the session when absent
    #[serde(default)]
    pub username: Option<String>,
    /// The message arrived from the external bridge
    #[serde(default)]
    pub discord: bool,
    #[serde(default)]
    pub discord_discriminator: Option<String>,
    /// The server generated the message
    #[serde(default)]
    pub server: bool,
    /// Relay to the bridge only; no database write, no lobby broadcast
    #[serde(default)]
    pub only_discord: bool,
}

impl ChatRequest {
    /// A message typed by a user
    pub fn user(msg: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            room: room.into(),
            ..Default::default()
        }
    }

    /// A message generated by the server
    pub fn server(msg: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            room: room.into(),
            server: true,
            ..Default::default()
        }
    }

    /// Whether no user typed this message on our server
    pub fn automated(&self) -> bool {
        self.discord || self.server
    }

    fn log_line(&self, msg: &str) -> String {
        let mut line = format!("#{} ", self.room);
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            line.push('<');
            line.push_str(username);
            if let Some(discriminator) = &self.discord_discriminator {
                line.push('#');
                line.push_str(discriminator);
            }
            line.push_str("> ");
        }
        line.push_str(msg);
        line
    }
}

/// Validates, persists and delivers chat messages
pub struct ChatService {
    registry: Arc<TableRegistry>,
    sessions: Arc<dyn SessionDirectory>,
    chat_log: Arc<dyn ChatLogRepository>,
    bridge: Arc<dyn ChatBridge>,
    commands: Arc<dyn ChatCommandHandler>,
    sanitizer: Arc<dyn Sanitizer>,
}

impl ChatService {
    /// Create a chat service using the strict HTML policy
    pub fn new(
        registry: Arc<TableRegistry>,
        sessions: Arc<dyn SessionDirectory>,
        chat_log: Arc<dyn ChatLogRepository>,
        bridge: Arc<dyn ChatBridge>,
        commands: Arc<dyn ChatCommandHandler>,
    ) -> Self {
        Self {
            registry,
            sessions,
            chat_log,
            bridge,
            commands,
            sanitizer: Arc::new(StrictPolicy),
        }
    }

    /// Replace the HTML sanitizer
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Handle a chat message, locking the target table if it is a table room
    pub async fn chat(&self, session: Option<&Arc<Session>>, request: ChatRequest) {
        self.chat_with(session, request, Access::Lock).await;
    }

    /// Handle a chat message.
    ///
    /// Failures are reported to the session (or only logged when there is
    /// none); nothing is returned to the caller.
    ///
    /// # Arguments
    ///
    /// * `session` - Sender; may be `None` for server and bridge messages
    /// * `request` - The message
    /// * `access` - For table rooms, whether the table's lock is already held
    pub async fn chat_with(
        &self,
        session: Option<&Arc<Session>>,
        mut request: ChatRequest,
        access: Access<'_>,
    ) {
        if let Err(err) = self.process(session, &mut request, access).await {
            report(session.map(Arc::as_ref), &err);
        }
    }

    /// Send a message as the server
    pub async fn send_server(&self, msg: &str, room: &str, access: Access<'_>) {
        self.chat_with(None, ChatRequest::server(msg, room), access)
            .await;
    }

    /// Handle a lobby message relayed from the bridge
    pub async fn send_lobby_bridge(&self, username: &str, discriminator: Option<&str>, msg: &str) {
        let request = ChatRequest {
            msg: msg.to_string(),
            room: LOBBY_ROOM.to_string(),
            username: Some(username.to_string()),
            discord: true,
            discord_discriminator: discriminator.map(str::to_string),
            ..Default::default()
        };
        self.chat(None, request).await;
    }

    async fn process(
        &self,
        session: Option<&Arc<Session>>,
        request: &mut ChatRequest,
        access: Access<'_>,
    ) -> Result<(), ChatError> {
        let user_id = if request.automated() {
            SERVER_USER_ID
        } else {
            session.ok_or(ChatError::MissingSession)?.user_id()
        };
        if request.username.is_none()
            && let Some(session) = session
        {
            request.username = Some(session.username().to_string());
        }

        if session.is_some_and(|s| s.muted()) {
            return Err(ChatError::Muted);
        }

        let raw_msg = sanitize_chat_input(&request.msg, request.server)?;
        let prepared = PreparedChat {
            msg: self.sanitizer.sanitize(&raw_msg),
            raw_msg,
        };

        if !is_valid_room(&request.room) {
            return Err(ChatError::InvalidRoom);
        }

        log::info!("{}", request.log_line(&prepared.msg));

        if request.room.starts_with(TABLE_ROOM_PREFIX) {
            self.chat_table(session, request, prepared, access).await
        } else {
            self.chat_lobby(session, request, prepared, user_id).await
        }
    }

    async fn chat_lobby(
        &self,
        session: Option<&Arc<Session>>,
        request: &ChatRequest,
        prepared: PreparedChat,
        user_id: i64,
    ) -> Result<(), ChatError> {
        let username = request.username.clone().unwrap_or_default();

        let msg = self.bridge.fill_mentions(&prepared.msg);
        let msg = self.bridge.fill_channels(&msg);

        if request.discord {
            self.chat_log
                .insert_bridge(&username, &msg, &request.room)
                .await?;
        } else if !request.only_discord {
            self.chat_log.insert(user_id, &msg, &request.room).await?;
        }

        if !request.only_discord {
            self.sessions
                .broadcast(ServerMessage::Chat(ChatMessage {
                    msg: msg.clone(),
                    who: username.clone(),
                    discord: request.discord,
                    server: request.server,
                    datetime: Utc::now(),
                    room: request.room.clone(),
                }))
                .await;
        }

        // Messages from the bridge are already there
        if !request.discord {
            let relayed = relay_text(&prepared.raw_msg, request.server);
            if let Err(e) = self.bridge.send(&username, &relayed).await {
                log::warn!("Failed to relay a lobby message to the bridge: {}", e);
            }
        }

        self.dispatch_command(session, &msg, &request.room, None)
            .await;

        Ok(())
    }

    async fn chat_table(
        &self,
        session: Option<&Arc<Session>>,
        request: &ChatRequest,
        prepared: PreparedChat,
        access: Access<'_>,
    ) -> Result<(), ChatError> {
        let table_id = parse_table_room(&request.room)
            .ok_or_else(|| ChatError::MalformedTableRoom(request.room.clone()))?;

        let Some(mut table) = self
            .registry
            .resolve(session.map(Arc::as_ref), table_id, access)
            .await
        else {
            return Ok(());
        };

        let sender = if request.server {
            None
        } else {
            let session = session.ok_or(ChatError::MissingSession)?;
            if table.seat_of(session.user_id()).is_none() {
                return Err(ChatError::NotAtTable(table.id()));
            }
            Some(session.user_id())
        };

        let username = request.username.clone().unwrap_or_default();
        let datetime = Utc::now();
        table.chat.push(TableChatMessage {
            user_id: session.map_or(SERVER_USER_ID, |s| s.user_id()),
            username: username.clone(),
            msg: prepared.msg.clone(),
            datetime,
        });

        table.notify_chat(ChatMessage {
            msg: prepared.msg.clone(),
            who: username,
            discord: request.discord,
            server: request.server,
            datetime,
            room: request.room.clone(),
        });

        self.dispatch_command(session, &prepared.msg, &request.room, Some(&mut *table))
            .await;

        if let Some(user_id) = sender {
            // Sending a message ends their typing; seats may have moved during the command
            if let Some(seat) = table.seat_of(user_id)
                && let Some(participant) = table.participant_mut(seat)
            {
                participant.typing = false;
            }
        }

        Ok(())
    }

    async fn dispatch_command(
        &self,
        session: Option<&Arc<Session>>,
        msg: &str,
        room: &str,
        table: Option<&mut LockedTable>,
    ) {
        let Some(command) = parse_chat_command(msg) else {
            return;
        };
        self.commands
            .handle(self, session, command, room, table)
            .await;
    }
}
