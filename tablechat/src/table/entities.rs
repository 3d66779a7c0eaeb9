//! Table, participant and in-memory transcript types.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    messages::{ChatMessage, ServerMessage},
    session::Session,
};

/// Table identifier
pub type TableId = u64;

/// A player or spectator seated at a table
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: i64,
    pub name: String,
    pub typing: bool,
    /// Time of the last reported keystroke
    pub last_typed: Option<Instant>,
    /// None while the user is disconnected
    pub session: Option<Arc<Session>>,
}

impl Participant {
    pub fn new(user_id: i64, name: impl Into<String>, session: Option<Arc<Session>>) -> Self {
        Self {
            user_id,
            name: name.into(),
            typing: false,
            last_typed: None,
            session,
        }
    }

    /// Build a participant from a connected session
    pub fn from_session(session: &Arc<Session>) -> Self {
        Self::new(session.user_id(), session.username(), Some(session.clone()))
    }

    fn emit(&self, message: ServerMessage) {
        if let Some(session) = &self.session {
            session.emit(message);
        }
    }
}

/// A chat line kept in the table's transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChatMessage {
    pub user_id: i64,
    pub username: String,
    pub msg: String,
    pub datetime: DateTime<Utc>,
}

/// Where a user sits at a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player(usize),
    Spectator(usize),
}

impl Seat {
    pub fn is_spectator(&self) -> bool {
        matches!(self, Seat::Spectator(_))
    }
}

/// Mutable state of a table. Only reachable through a [`super::LockedTable`].
#[derive(Debug, Default)]
pub struct TableState {
    pub players: Vec<Participant>,
    pub spectators: Vec<Participant>,
    pub chat: Vec<TableChatMessage>,
    pub running: bool,
    pub replay: bool,
}

impl TableState {
    pub fn player_index(&self, user_id: i64) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn spectator_index(&self, user_id: i64) -> Option<usize> {
        self.spectators.iter().position(|p| p.user_id == user_id)
    }

    /// Find a user's seat.
    ///
    /// Spectators are checked first: a player may be spectating a shared
    /// replay of their own game.
    pub fn seat_of(&self, user_id: i64) -> Option<Seat> {
        self.spectator_index(user_id)
            .map(Seat::Spectator)
            .or_else(|| self.player_index(user_id).map(Seat::Player))
    }

    /// Get the participant in a seat previously returned by [`Self::seat_of`]
    pub fn participant_mut(&mut self, seat: Seat) -> Option<&mut Participant> {
        match seat {
            Seat::Player(i) => self.players.get_mut(i),
            Seat::Spectator(i) => self.spectators.get_mut(i),
        }
    }

    /// Add a player; returns false if they are already playing
    pub fn add_player(&mut self, participant: Participant) -> bool {
        if self.player_index(participant.user_id).is_some() {
            return false;
        }
        self.players.push(participant);
        true
    }

    /// Add a spectator; returns false if they are already spectating
    pub fn add_spectator(&mut self, participant: Participant) -> bool {
        if self.spectator_index(participant.user_id).is_some() {
            return false;
        }
        self.spectators.push(participant);
        true
    }

    /// Remove a player. The typing flag is dropped silently; the departure
    /// itself tells everyone else that they are gone.
    pub fn remove_player(&mut self, user_id: i64) -> Option<Participant> {
        let i = self.player_index(user_id)?;
        let mut participant = self.players.remove(i);
        participant.typing = false;
        Some(participant)
    }

    /// Remove a spectator, clearing their typing flag without notification
    pub fn remove_spectator(&mut self, user_id: i64) -> Option<Participant> {
        let i = self.spectator_index(user_id)?;
        let mut participant = self.spectators.remove(i);
        participant.typing = false;
        Some(participant)
    }

    /// Send a message to every player and spectator
    pub fn notify_all(&self, message: &ServerMessage) {
        for participant in self.players.iter().chain(self.spectators.iter()) {
            participant.emit(message.clone());
        }
    }

    pub fn notify_chat(&self, chat: ChatMessage) {
        self.notify_all(&ServerMessage::Chat(chat));
    }

    /// Tell everyone except the typist that they started or stopped typing
    pub fn notify_typing(&self, user_id: i64, name: &str, typing: bool) {
        let message = ServerMessage::ChatTyping {
            name: name.to_string(),
            typing,
        };
        for participant in self.players.iter().chain(self.spectators.iter()) {
            if participant.user_id != user_id {
                participant.emit(message.clone());
            }
        }
    }
}

/// A shared table
#[derive(Debug)]
pub struct Table {
    id: TableId,
    generation: u64,
    name: String,
    pub(super) state: Arc<Mutex<TableState>>,
}

impl Table {
    pub(super) fn new(id: TableId, generation: u64, name: String) -> Self {
        Self {
            id,
            generation,
            name,
            state: Arc::new(Mutex::new(TableState::default())),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// Identity of this table instance. A table re-created under the same id
    /// gets a new generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
