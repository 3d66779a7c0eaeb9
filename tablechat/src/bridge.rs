//! External chat relay.
//!
//! Lobby chat is mirrored to an external chat service. The relay receives the
//! raw (not HTML-escaped) text since it renders plain text itself.

use async_trait::async_trait;
use thiserror::Error;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The relay could not be reached or refused the message
    #[error("Bridge request failed: {0}")]
    Request(String),
}

/// External chat relay collaborator
#[async_trait]
pub trait ChatBridge: Send + Sync {
    /// Replace relay-side user mentions with display names
    fn fill_mentions(&self, msg: &str) -> String {
        msg.to_string()
    }

    /// Replace relay-side channel references with channel names
    fn fill_channels(&self, msg: &str) -> String {
        msg.to_string()
    }

    /// Relay a lobby message
    async fn send(&self, username: &str, msg: &str) -> Result<(), BridgeError>;
}

/// Bridge used when no relay is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBridge;

#[async_trait]
impl ChatBridge for DisabledBridge {
    async fn send(&self, username: &str, msg: &str) -> Result<(), BridgeError> {
        log::trace!("Bridge disabled, not relaying <{}> {}", username, msg);
        Ok(())
    }
}

/// Prepare raw lobby text for the relay.
///
/// Mass mentions are defused for messages typed by users because the relay's
/// account is allowed to use them. HTML-escaped ampersands are restored.
pub fn relay_text(raw_msg: &str, server: bool) -> String {
    let mut msg = raw_msg.to_string();
    if !server {
        msg = msg.replace("@everyone", "AtEveryone");
        msg = msg.replace("@here", "AtHere");
    }
    msg.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_mass_mentions_are_defused() {
        assert_eq!(
            relay_text("hey @everyone and @here", false),
            "hey AtEveryone and AtHere"
        );
    }

    #[test]
    fn server_mass_mentions_are_kept() {
        assert_eq!(relay_text("@everyone restart soon", true), "@everyone restart soon");
    }

    #[test]
    fn ampersand_is_unescaped() {
        assert_eq!(relay_text("salt &amp; pepper", false), "salt & pepper");
        assert_eq!(relay_text("salt &amp; pepper", true), "salt & pepper");
    }

    #[tokio::test]
    async fn disabled_bridge_accepts_everything() {
        let bridge = DisabledBridge;
        assert!(bridge.send("alice", "hi").await.is_ok());
        assert_eq!(bridge.fill_mentions("<@123>"), "<@123>");
        assert_eq!(bridge.fill_channels("<#456>"), "<#456>");
    }
}
