//! Commands embedded in chat messages (`/help`, `/random 1 6`, ...).

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

use super::{pipeline::ChatService, room::LOBBY_ROOM};
use crate::{
    messages::{ChatMessage, ServerMessage},
    session::Session,
    table::{Access, LockedTable},
    termination::{TerminateRequest, TerminationGate},
};

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    /// Lowercase name without the leading slash
    pub name: String,
    pub args: Vec<String>,
}

/// Parse a chat command. Commands start with `/` directly followed by a name.
pub fn parse_chat_command(msg: &str) -> Option<ChatCommand> {
    let body = msg.strip_prefix('/')?;
    let mut parts = body.split_whitespace();
    let name = parts.next()?.to_lowercase();
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    Some(ChatCommand {
        name,
        args: parts.map(str::to_string).collect(),
    })
}

/// Handles commands found in accepted chat messages
#[async_trait]
pub trait ChatCommandHandler: Send + Sync {
    /// Run a command.
    ///
    /// # Arguments
    ///
    /// * `chat` - Chat service, for replies
    /// * `session` - Sender, `None` for bridge messages
    /// * `command` - The parsed command
    /// * `room` - Room the command was typed in
    /// * `table` - Guard of the table the command was typed at; its lock is
    ///   already held, so the handler must pass it on as [`Access::Held`]
    async fn handle(
        &self,
        chat: &ChatService,
        session: Option<&Arc<Session>>,
        command: ChatCommand,
        room: &str,
        table: Option<&mut LockedTable>,
    );
}

const HELP_TEXT: &str = "Available commands: /help, /random [min] [max], /terminate";

/// Commands available on every server
pub struct BuiltinChatCommands {
    termination: Arc<TerminationGate>,
}

impl BuiltinChatCommands {
    pub fn new(termination: Arc<TerminationGate>) -> Self {
        Self { termination }
    }

    async fn random(
        &self,
        chat: &ChatService,
        session: Option<&Arc<Session>>,
        args: &[String],
        room: &str,
        table: Option<&mut LockedTable>,
    ) {
        let (min, max) = match parse_random_bounds(args) {
            Ok(bounds) => bounds,
            Err(warning) => {
                if let Some(session) = session {
                    session.warning(warning);
                }
                return;
            }
        };

        let n = rand::rng().random_range(min..=max);
        let msg = format!("Random number between {min} and {max}: {n}");
        let access = match table {
            Some(table) => Access::Held(table),
            None => Access::Lock,
        };
        chat.send_server(&msg, room, access).await;
    }
}

fn parse_random_bounds(args: &[String]) -> Result<(i64, i64), String> {
    let parse = |arg: &String| {
        arg.parse::<i64>()
            .map_err(|_| format!("\"{arg}\" is not an integer."))
    };
    let (min, max) = match args {
        [] => (1, 10),
        [max] => (1, parse(max)?),
        [min, max, ..] => (parse(min)?, parse(max)?),
    };
    if min > max {
        return Err(format!("The minimum ({min}) cannot be larger than the maximum ({max})."));
    }
    Ok((min, max))
}

#[async_trait]
impl ChatCommandHandler for BuiltinChatCommands {
    async fn handle(
        &self,
        chat: &ChatService,
        session: Option<&Arc<Session>>,
        command: ChatCommand,
        room: &str,
        table: Option<&mut LockedTable>,
    ) {
        log::debug!("Chat command /{} in #{}", command.name, room);

        match command.name.as_str() {
            "help" => {
                // Only the asker sees the help text
                if let Some(session) = session {
                    session.emit(ServerMessage::Chat(ChatMessage {
                        msg: HELP_TEXT.to_string(),
                        who: String::new(),
                        discord: false,
                        server: true,
                        datetime: chrono::Utc::now(),
                        room: room.to_string(),
                    }));
                }
            }
            "random" => {
                self.random(chat, session, &command.args, room, table).await;
            }
            "terminate" => {
                let Some(session) = session else {
                    return;
                };
                match table {
                    Some(table) => {
                        let request = TerminateRequest {
                            table_id: table.id(),
                            server: false,
                        };
                        self.termination
                            .terminate(Some(session), request, Access::Held(table))
                            .await;
                    }
                    None => session.warning(format!(
                        "The /terminate command cannot be used in the {LOBBY_ROOM}."
                    )),
                }
            }
            name => {
                if let Some(session) = session {
                    session.warning(format!("The command \"/{name}\" is not valid."));
                }
            }
        }
    }
}
