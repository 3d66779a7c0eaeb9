//! Webhook relay for lobby chat.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tablechat::bridge::{BridgeError, ChatBridge};

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    username: &'a str,
    content: &'a str,
}

/// Posts lobby chat to a webhook
pub struct WebhookBridge {
    url: String,
    client: reqwest::Client,
}

impl WebhookBridge {
    /// Create a bridge posting to `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Request(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ChatBridge for WebhookBridge {
    async fn send(&self, username: &str, msg: &str) -> Result<(), BridgeError> {
        // Server messages have no author; the webhook then uses its own name
        let username = if username.is_empty() { "server" } else { username };

        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage {
                username,
                content: msg,
            })
            .send()
            .await
            .map_err(|e| BridgeError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::Request(format!(
                "webhook answered {}",
                response.status()
            )));
        }

        Ok(())
    }
}
