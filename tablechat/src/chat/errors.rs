//! Chat and typing error types.

use thiserror::Error;

use crate::{
    constants::GENERIC_ERROR,
    db::ChatLogError,
    errors::{Severity, UserFacing},
    table::TableId,
};

/// Reasons a chat message is not delivered
#[derive(Debug, Error)]
pub enum ChatError {
    /// An interactive message arrived without a session
    #[error("Failed to send a chat message because the sender's session was missing.")]
    MissingSession,

    #[error("You have been muted by an administrator.")]
    Muted,

    /// Truncation split a multi-byte character, or the input was not UTF-8
    #[error("Chat messages must contain valid UTF8 characters.")]
    InvalidUtf8,

    #[error("Chat messages cannot be blank.")]
    Blank,

    #[error("Chat messages cannot contain more than {max} consecutive diacritics.")]
    TooManyDiacritics { max: usize },

    #[error("That is not a valid room.")]
    InvalidRoom,

    /// A table room whose id could not be parsed
    #[error("Failed to parse the table ID from the room: {0}")]
    MalformedTableRoom(String),

    #[error("You are not playing or spectating at table {0}, so you cannot send chat to it.")]
    NotAtTable(TableId),

    #[error("Failed to insert a chat message into the database: {0}")]
    Persistence(#[from] ChatLogError),
}

impl UserFacing for ChatError {
    fn severity(&self) -> Severity {
        match self {
            ChatError::MissingSession => Severity::Internal,
            ChatError::MalformedTableRoom(_) | ChatError::Persistence(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ChatError::MalformedTableRoom(_) => "That is an invalid room.".to_string(),
            ChatError::Persistence(_) => GENERIC_ERROR.to_string(),
            _ => self.to_string(),
        }
    }
}

/// Reasons a typing report is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypingError {
    #[error(
        "You are not playing or spectating at table {0}, so you cannot report that you are typing."
    )]
    NotAtTable(TableId),

    #[error("You are not spectating replay {0}, so you cannot report that you are typing.")]
    NotSpectatingReplay(TableId),
}

impl UserFacing for TypingError {
    fn severity(&self) -> Severity {
        Severity::Warning
    }
}
