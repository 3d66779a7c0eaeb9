//! Validation and sanitization of chat text.

use super::errors::ChatError;
use crate::constants::{CONSECUTIVE_DIACRITICS_ALLOWED, MAX_CHAT_LENGTH, MAX_CHAT_LENGTH_SERVER};

/// A validated chat message in both of its forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedChat {
    /// HTML-safe text shown to clients and stored in the log
    pub msg: String,
    /// Validated text before HTML sanitization, relayed to the bridge
    pub raw_msg: String,
}

/// Produces a display-safe copy of user text
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
}

/// Strict HTML policy: no markup survives.
///
/// Tags are stripped and the remaining special characters are escaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictPolicy;

impl Sanitizer for StrictPolicy {
    fn sanitize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if c == '<'
                && let Some(end) = tag_end(rest)
            {
                rest = &rest[end + 1..];
                continue;
            }

            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&#34;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
            rest = &rest[c.len_utf8()..];
        }

        out
    }
}

/// Byte offset of the `>` closing a tag that starts at the beginning of `text`
fn tag_end(text: &str) -> Option<usize> {
    let next = text[1..].chars().next()?;
    if !(next.is_ascii_alphabetic() || next == '/' || next == '!') {
        return None;
    }
    text.find('>')
}

/// Whether a character is a combining mark (general category M)
pub fn is_diacritic(c: char) -> bool {
    unicode_normalization::char::is_combining_mark(c)
}

/// Longest run of diacritics in a row
pub fn consecutive_diacritics(text: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if is_diacritic(c) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

/// Cut a message down to the origin's cap.
///
/// Anything longer than the cap is cut to one byte less than the cap. The cut
/// is byte based and may land inside a character.
pub fn truncate(msg: &[u8], server: bool) -> &[u8] {
    let max_length = if server {
        MAX_CHAT_LENGTH_SERVER
    } else {
        MAX_CHAT_LENGTH
    };
    if msg.len() > max_length {
        &msg[..max_length - 1]
    } else {
        msg
    }
}

/// Replace every whitespace character other than a space with a space, then trim
pub fn normalize_whitespace(msg: &str) -> String {
    let replaced: String = msg
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    replaced.trim().to_string()
}

/// Validate user chat text.
///
/// The message is truncated first so oversized input costs nothing further.
///
/// # Arguments
///
/// * `msg` - Text as received
/// * `server` - Whether the server generated the message (higher length cap)
///
/// # Returns
///
/// * `Result<String, ChatError>` - Normalized text, or why it was refused
pub fn sanitize_chat_input(msg: &str, server: bool) -> Result<String, ChatError> {
    let truncated = truncate(msg.as_bytes(), server);
    let msg = std::str::from_utf8(truncated).map_err(|_| ChatError::InvalidUtf8)?;

    let msg = normalize_whitespace(msg);
    if msg.is_empty() {
        return Err(ChatError::Blank);
    }

    if consecutive_diacritics(&msg) > CONSECUTIVE_DIACRITICS_ALLOWED {
        return Err(ChatError::TooManyDiacritics {
            max: CONSECUTIVE_DIACRITICS_ALLOWED,
        });
    }

    Ok(msg)
}
