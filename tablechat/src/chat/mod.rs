//! Chat pipeline, embedded chat commands and typing status.
//!
//! A chat message flows through a fixed pipeline: origin resolution, mute
//! check, length cap, encoding check, whitespace normalization, blank and
//! diacritic-flood rejection, HTML sanitization and room validation. Accepted
//! lobby messages are persisted, broadcast and relayed to the bridge; table
//! messages go to the table's players and spectators under the table lock.

pub mod commands;
pub mod errors;
pub mod pipeline;
pub mod room;
pub mod sanitize;
pub mod typing;

pub use commands::{BuiltinChatCommands, ChatCommand, ChatCommandHandler, parse_chat_command};
pub use errors::{ChatError, TypingError};
pub use pipeline::{ChatRequest, ChatService};
pub use room::{LOBBY_ROOM, TABLE_ROOM_PREFIX, is_valid_room, parse_table_room, table_room};
pub use sanitize::{PreparedChat, Sanitizer, StrictPolicy, sanitize_chat_input};
pub use typing::TypingTracker;
