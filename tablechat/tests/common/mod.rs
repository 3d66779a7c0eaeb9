//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tablechat::{
    bridge::{BridgeError, ChatBridge},
    chat::{BuiltinChatCommands, ChatService, TypingTracker},
    db::{ChatLogError, ChatLogRepository, ChatLogResult, MemoryChatLogRepository},
    messages::ServerMessage,
    session::{InMemorySessionDirectory, Session},
    table::{LockedTable, Participant, Table, TableRegistry},
    termination::{ActionHandler, GameAction, TerminationGate},
};
use tokio::sync::mpsc;

/// Bridge that remembers what it was asked to relay
#[derive(Default)]
pub struct RecordingBridge {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingBridge {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBridge for RecordingBridge {
    async fn send(&self, username: &str, msg: &str) -> Result<(), BridgeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Request("relay is down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((username.to_string(), msg.to_string()));
        Ok(())
    }
}

/// Action handler that records actions and ends the game
#[derive(Default)]
pub struct RecordingActions {
    pub actions: Mutex<Vec<GameAction>>,
}

impl RecordingActions {
    pub fn actions(&self) -> Vec<GameAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingActions {
    async fn handle_action(
        &self,
        _session: Option<&Arc<Session>>,
        action: GameAction,
        table: &mut LockedTable,
    ) {
        assert_eq!(table.id(), action.table_id);
        table.running = false;
        self.actions.lock().unwrap().push(action);
    }
}

/// Chat log whose writes always fail
pub struct FailingChatLog;

#[async_trait]
impl ChatLogRepository for FailingChatLog {
    async fn insert(&self, _user_id: i64, _msg: &str, _room: &str) -> ChatLogResult<()> {
        Err(ChatLogError::Timeout(Duration::from_secs(5)))
    }

    async fn insert_bridge(&self, _username: &str, _msg: &str, _room: &str) -> ChatLogResult<()> {
        Err(ChatLogError::Timeout(Duration::from_secs(5)))
    }
}

pub struct Harness {
    pub registry: Arc<TableRegistry>,
    pub sessions: Arc<InMemorySessionDirectory>,
    pub chat_log: Arc<MemoryChatLogRepository>,
    pub bridge: Arc<RecordingBridge>,
    pub actions: Arc<RecordingActions>,
    pub termination: Arc<TerminationGate>,
    pub chat: ChatService,
    pub typing: TypingTracker,
}

impl Harness {
    pub fn new() -> Self {
        let chat_log = Arc::new(MemoryChatLogRepository::new());
        Self::build(chat_log.clone(), chat_log)
    }

    /// A harness whose chat log rejects every write
    pub fn with_failing_chat_log() -> Self {
        Self::build(
            Arc::new(FailingChatLog),
            Arc::new(MemoryChatLogRepository::new()),
        )
    }

    fn build(
        chat_log: Arc<dyn ChatLogRepository>,
        memory_log: Arc<MemoryChatLogRepository>,
    ) -> Self {
        let registry = Arc::new(TableRegistry::new());
        let sessions = Arc::new(InMemorySessionDirectory::new());
        let bridge = Arc::new(RecordingBridge::default());
        let actions = Arc::new(RecordingActions::default());
        let termination = Arc::new(TerminationGate::new(registry.clone(), actions.clone()));
        let commands = Arc::new(BuiltinChatCommands::new(termination.clone()));
        let chat = ChatService::new(
            registry.clone(),
            sessions.clone(),
            chat_log,
            bridge.clone(),
            commands,
        );
        let typing = TypingTracker::new(registry.clone());

        Self {
            registry,
            sessions,
            chat_log: memory_log,
            bridge,
            actions,
            termination,
            chat,
            typing,
        }
    }

    /// Connect a user and register their session
    pub async fn connect(
        &self,
        user_id: i64,
        name: &str,
    ) -> (Arc<Session>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let session = Arc::new(Session::new(user_id, name, tx));
        self.sessions.register(session.clone()).await;
        (session, rx)
    }

    pub async fn seat_player(&self, table: &Arc<Table>, session: &Arc<Session>) {
        let mut locked = LockedTable::lock(table.clone()).await;
        locked.add_player(Participant::from_session(session));
    }

    pub async fn seat_spectator(&self, table: &Arc<Table>, session: &Arc<Session>) {
        let mut locked = LockedTable::lock(table.clone()).await;
        locked.add_spectator(Participant::from_session(session));
    }
}

/// Everything currently queued for a session
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

/// Chat lines currently queued for a session
pub fn chats(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<tablechat::ChatMessage> {
    drain(rx)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::Chat(chat) => Some(chat),
            _ => None,
        })
        .collect()
}

pub fn warning(text: impl Into<String>) -> ServerMessage {
    ServerMessage::Warning {
        warning: text.into(),
    }
}

pub fn typing(name: &str, typing: bool) -> ServerMessage {
    ServerMessage::ChatTyping {
        name: name.to_string(),
        typing,
    }
}
