//! Chat log repository definitions.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Timeout for a single chat log write
pub const CHAT_LOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat log errors
#[derive(Debug, Error)]
pub enum ChatLogError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The write did not finish in time
    #[error("Chat log write timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for chat log operations
pub type ChatLogResult<T> = Result<T, ChatLogError>;

/// Who wrote a persisted chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSender {
    /// A user of this server; 0 for server messages
    User(i64),
    /// Someone on the external relay, by their relay name
    Bridge(String),
}

/// A persisted chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub sender: ChatSender,
    pub msg: String,
    pub room: String,
}

/// Trait for chat log operations
#[async_trait]
pub trait ChatLogRepository: Send + Sync {
    /// Store a message written by a user (or the server, as user 0)
    async fn insert(&self, user_id: i64, msg: &str, room: &str) -> ChatLogResult<()>;

    /// Store a message that arrived from the external relay
    async fn insert_bridge(&self, username: &str, msg: &str, room: &str) -> ChatLogResult<()>;
}

/// PostgreSQL implementation of `ChatLogRepository`
pub struct PgChatLogRepository {
    pool: PgPool,
}

impl PgChatLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatLogRepository for PgChatLogRepository {
    async fn insert(&self, user_id: i64, msg: &str, room: &str) -> ChatLogResult<()> {
        let query = sqlx::query("INSERT INTO chat_log (user_id, message, room) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(msg)
            .bind(room)
            .execute(&self.pool);

        tokio::time::timeout(CHAT_LOG_TIMEOUT, query)
            .await
            .map_err(|_| ChatLogError::Timeout(CHAT_LOG_TIMEOUT))??;
        Ok(())
    }

    async fn insert_bridge(&self, username: &str, msg: &str, room: &str) -> ChatLogResult<()> {
        let query = sqlx::query(
            "INSERT INTO chat_log_discord (discord_name, message, room) VALUES ($1, $2, $3)",
        )
        .bind(username)
        .bind(msg)
        .bind(room)
        .execute(&self.pool);

        tokio::time::timeout(CHAT_LOG_TIMEOUT, query)
            .await
            .map_err(|_| ChatLogError::Timeout(CHAT_LOG_TIMEOUT))??;
        Ok(())
    }
}

/// Chat log kept in memory, used when no database is configured
#[derive(Default)]
pub struct MemoryChatLogRepository {
    records: Mutex<Vec<ChatRecord>>,
}

impl MemoryChatLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything logged so far, oldest first
    pub async fn records(&self) -> Vec<ChatRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ChatLogRepository for MemoryChatLogRepository {
    async fn insert(&self, user_id: i64, msg: &str, room: &str) -> ChatLogResult<()> {
        self.records.lock().await.push(ChatRecord {
            sender: ChatSender::User(user_id),
            msg: msg.to_string(),
            room: room.to_string(),
        });
        Ok(())
    }

    async fn insert_bridge(&self, username: &str, msg: &str, room: &str) -> ChatLogResult<()> {
        self.records.lock().await.push(ChatRecord {
            sender: ChatSender::Bridge(username.to_string()),
            msg: msg.to_string(),
            room: room.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_log_keeps_order_and_sender() {
        let repo = MemoryChatLogRepository::new();
        repo.insert(7, "hello", "lobby").await.unwrap();
        repo.insert_bridge("relay_user", "hi back", "lobby")
            .await
            .unwrap();

        let records = repo.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sender, ChatSender::User(7));
        assert_eq!(records[1].sender, ChatSender::Bridge("relay_user".to_string()));
        assert_eq!(records[1].msg, "hi back");
    }

    #[test]
    fn timeout_error_display() {
        let err = ChatLogError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
    }
}
