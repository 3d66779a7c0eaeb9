//! Connected sessions and the directory that enumerates them.
//!
//! A [`Session`] is the server side of one client connection. Messages are
//! pushed into a bounded channel that the transport drains; pushing never
//! blocks, so it is safe to emit while a table lock is held.
//!
//! The [`SessionDirectory`] is synchronized independently from table locks.
//! When both are needed, the table lock is taken first.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::{RwLock, mpsc};

use crate::{constants::GENERIC_ERROR, messages::ServerMessage};

/// Server side of a client connection
#[derive(Debug)]
pub struct Session {
    user_id: i64,
    username: String,
    muted: AtomicBool,
    sender: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session
    ///
    /// # Arguments
    ///
    /// * `user_id` - Identifier of the connected user
    /// * `username` - Display name
    /// * `sender` - Outbound channel drained by the transport
    pub fn new(user_id: i64, username: impl Into<String>, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            user_id,
            username: username.into(),
            muted: AtomicBool::new(false),
            sender,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether an administrator has muted this session
    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Push a message to the client without waiting
    pub fn emit(&self, message: ServerMessage) {
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                log::warn!(
                    "Outbound channel of user {} is full, dropping: {}",
                    self.user_id,
                    message
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("User {} disconnected, dropping message", self.user_id);
            }
        }
    }

    pub fn warning(&self, warning: impl Into<String>) {
        self.emit(ServerMessage::Warning {
            warning: warning.into(),
        });
    }

    /// Send an error; an empty message is replaced by a generic one.
    pub fn error(&self, error: impl Into<String>) {
        let mut error = error.into();
        if error.is_empty() {
            error = GENERIC_ERROR.to_string();
        }
        self.emit(ServerMessage::Error { error });
    }
}

/// Enumerates connected sessions and delivers messages to them
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Snapshot of every connected session
    async fn sessions(&self) -> Vec<Arc<Session>>;

    /// Find the session of a user
    async fn get(&self, user_id: i64) -> Option<Arc<Session>>;

    /// Deliver a message to every connected session
    async fn broadcast(&self, message: ServerMessage) {
        for session in self.sessions().await {
            session.emit(message.clone());
        }
    }

    /// Deliver a message to one user, returning whether they were connected
    async fn send_to(&self, user_id: i64, message: ServerMessage) -> bool {
        match self.get(user_id).await {
            Some(session) => {
                session.emit(message);
                true
            }
            None => false,
        }
    }
}

/// Session directory kept in process memory
#[derive(Default)]
pub struct InMemorySessionDirectory {
    sessions: RwLock<HashMap<i64, Arc<Session>>>,
}

impl InMemorySessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, replacing any previous session of the same user
    pub async fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.user_id(), session)
    }

    pub async fn unregister(&self, user_id: i64) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&user_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessionDirectory {
    async fn sessions(&self) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    async fn get(&self, user_id: i64) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.get(&user_id).cloned()
    }

    async fn broadcast(&self, message: ServerMessage) {
        // Emitting never blocks, so the read lock is held for the whole fan-out
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            session.emit(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: i64, name: &str) -> (Arc<Session>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(Session::new(user_id, name, tx)), rx)
    }

    #[test]
    fn empty_error_becomes_generic() {
        let (s, mut rx) = session(1, "alice");
        s.error("");
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::Error {
                error: GENERIC_ERROR.to_string()
            }
        );
    }

    #[test]
    fn emit_to_closed_channel_is_silent() {
        let (s, rx) = session(1, "alice");
        drop(rx);
        s.warning("nobody listens");
    }

    #[test]
    fn emit_to_full_channel_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let s = Session::new(1, "alice", tx);
        s.warning("first");
        s.warning("second");
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mute_flag() {
        let (s, _rx) = session(1, "alice");
        assert!(!s.muted());
        s.set_muted(true);
        assert!(s.muted());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let directory = InMemorySessionDirectory::new();
        let (a, mut rx_a) = session(1, "alice");
        let (b, mut rx_b) = session(2, "bob");
        directory.register(a).await;
        directory.register(b).await;

        directory
            .broadcast(ServerMessage::Warning {
                warning: "hello".to_string(),
            })
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_unknown_user() {
        let directory = InMemorySessionDirectory::new();
        let (a, mut rx_a) = session(1, "alice");
        directory.register(a).await;

        assert!(
            !directory
                .send_to(
                    2,
                    ServerMessage::Warning {
                        warning: "x".to_string()
                    }
                )
                .await
        );
        assert!(
            directory
                .send_to(
                    1,
                    ServerMessage::Warning {
                        warning: "x".to_string()
                    }
                )
                .await
        );
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_removes_session() {
        let directory = InMemorySessionDirectory::new();
        let (a, _rx) = session(1, "alice");
        directory.register(a).await;
        assert_eq!(directory.len().await, 1);
        assert!(directory.unregister(1).await.is_some());
        assert!(directory.is_empty().await);
    }
}
