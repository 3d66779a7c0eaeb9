//! Messages pushed from the server to connected sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::table::TableId;
use crate::termination::EndCondition;

/// A chat line as delivered to clients.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChatMessage {
    pub msg: String,
    pub who: String,
    pub discord: bool,
    pub server: bool,
    pub datetime: DateTime<Utc>,
    pub room: String,
}

/// A message from the server to a client.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Chat(ChatMessage),
    /// Someone at the table started or stopped typing.
    ChatTyping { name: String, typing: bool },
    Warning { warning: String },
    Error { error: String },
    GameOver {
        table_id: TableId,
        end_condition: EndCondition,
        player_index: Option<usize>,
    },
    TableJoined { table_id: TableId, name: String },
    TableLeft { table_id: TableId },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Chat(chat) => write!(f, "#{} <{}> {}", chat.room, chat.who, chat.msg),
            Self::ChatTyping { name, typing } => {
                let state = if *typing { "started" } else { "stopped" };
                write!(f, "{name} {state} typing")
            }
            Self::Warning { warning } => write!(f, "warning: {warning}"),
            Self::Error { error } => write!(f, "error: {error}"),
            Self::GameOver { table_id, .. } => write!(f, "game over at table {table_id}"),
            Self::TableJoined { table_id, .. } => write!(f, "joined table {table_id}"),
            Self::TableLeft { table_id } => write!(f, "left table {table_id}"),
        }
    }
}
