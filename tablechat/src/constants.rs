//! Limits and timings that form the chat contract with clients.

use std::time::Duration;

/// Maximum chat length in bytes for messages typed by users.
pub const MAX_CHAT_LENGTH: usize = 300;

/// Maximum chat length in bytes for messages generated by the server.
pub const MAX_CHAT_LENGTH_SERVER: usize = 600;

/// Maximum number of combining marks allowed in a row.
pub const CONSECUTIVE_DIACRITICS_ALLOWED: usize = 3;

/// How long after the last keystroke a participant is considered to have stopped typing.
pub const TYPING_DELAY: Duration = Duration::from_millis(2000);

/// User id recorded for server and bridge originated messages.
pub const SERVER_USER_ID: i64 = 0;

/// Message shown when an error should not leak any detail.
pub const GENERIC_ERROR: &str = "Something went wrong. Please contact an administrator.";
