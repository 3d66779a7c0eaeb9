//! Table lifecycle: creating, joining, spectating, leaving and starting tables.
//!
//! Every operation runs under the table's lock. Announcements to the table
//! are sent as server chat through the held guard.

use std::sync::Arc;
use tablechat::{
    ChatService, ServerMessage, Session,
    chat::table_room,
    errors::{Severity, UserFacing, report},
    table::{Access, LockedTable, Participant, TableId, TableRegistry},
    termination::{TerminateRequest, TerminationGate},
};
use thiserror::Error;

/// Maximum length of a table name in characters
pub const MAX_TABLE_NAME_LENGTH: usize = 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Table names cannot be blank.")]
    BlankName,

    #[error("Table names cannot be longer than {MAX_TABLE_NAME_LENGTH} characters.")]
    NameTooLong,

    #[error("You are already at table {0}.")]
    AlreadySeated(TableId),

    #[error("The game at table {0} has already started.")]
    AlreadyStarted(TableId),

    #[error("You cannot play in replay {0}, only spectate it.")]
    Replay(TableId),

    #[error("You are not playing at table {0}, so you cannot start it.")]
    NotPlaying(TableId),

    #[error("You are not playing or spectating at table {0}.")]
    NotSeated(TableId),
}

impl UserFacing for LifecycleError {
    fn severity(&self) -> Severity {
        Severity::Warning
    }
}

/// Creates tables and moves users in and out of them
pub struct TableLifecycle {
    registry: Arc<TableRegistry>,
    chat: Arc<ChatService>,
    termination: Arc<TerminationGate>,
}

impl TableLifecycle {
    pub fn new(
        registry: Arc<TableRegistry>,
        chat: Arc<ChatService>,
        termination: Arc<TerminationGate>,
    ) -> Self {
        Self {
            registry,
            chat,
            termination,
        }
    }

    /// Create a table and seat its creator.
    ///
    /// The creator of a replay spectates it; anyone else's table gets them
    /// as its first player.
    ///
    /// # Returns
    ///
    /// * `Option<TableId>` - The new table, or `None` if the name was refused
    pub async fn create(&self, session: &Arc<Session>, name: &str, replay: bool) -> Option<TableId> {
        let name = name.trim();
        let refused = if name.is_empty() {
            Some(LifecycleError::BlankName)
        } else if name.chars().count() > MAX_TABLE_NAME_LENGTH {
            Some(LifecycleError::NameTooLong)
        } else {
            None
        };
        if let Some(err) = refused {
            report(Some(session.as_ref()), &err);
            return None;
        }

        let table = self.registry.create_table(name).await;
        let mut locked = LockedTable::lock(table).await;
        locked.replay = replay;
        if replay {
            locked.add_spectator(Participant::from_session(session));
        } else {
            locked.add_player(Participant::from_session(session));
        }

        log::info!(
            "User {} created table {} ({})",
            session.user_id(),
            locked.id(),
            locked.name()
        );
        session.emit(ServerMessage::TableJoined {
            table_id: locked.id(),
            name: locked.name().to_string(),
        });
        Some(locked.id())
    }

    /// Join a table as a player
    pub async fn join(&self, session: &Arc<Session>, table_id: TableId) {
        let Some(mut table) = self
            .registry
            .resolve(Some(session.as_ref()), table_id, Access::Lock)
            .await
        else {
            return;
        };

        let refused = if table.player_index(session.user_id()).is_some() {
            Some(LifecycleError::AlreadySeated(table_id))
        } else if table.replay {
            Some(LifecycleError::Replay(table_id))
        } else if table.running {
            Some(LifecycleError::AlreadyStarted(table_id))
        } else {
            None
        };
        if let Some(err) = refused {
            report(Some(session.as_ref()), &err);
            return;
        }

        table.add_player(Participant::from_session(session));
        session.emit(ServerMessage::TableJoined {
            table_id,
            name: table.name().to_string(),
        });

        let msg = format!("{} joined the table.", session.username());
        self.chat
            .send_server(&msg, &table_room(table_id), Access::Held(&mut *table))
            .await;
    }

    /// Spectate a table
    pub async fn spectate(&self, session: &Arc<Session>, table_id: TableId) {
        let Some(mut table) = self
            .registry
            .resolve(Some(session.as_ref()), table_id, Access::Lock)
            .await
        else {
            return;
        };

        if table.spectator_index(session.user_id()).is_some() {
            report(
                Some(session.as_ref()),
                &LifecycleError::AlreadySeated(table_id),
            );
            return;
        }

        table.add_spectator(Participant::from_session(session));
        session.emit(ServerMessage::TableJoined {
            table_id,
            name: table.name().to_string(),
        });
    }

    /// Leave a table
    pub async fn leave(&self, session: &Arc<Session>, table_id: TableId) {
        let Some(mut table) = self
            .registry
            .resolve(Some(session.as_ref()), table_id, Access::Lock)
            .await
        else {
            return;
        };

        if let Err(err) = self.depart(session, &mut *table).await {
            report(Some(session.as_ref()), &err);
        }
    }

    /// Start the game at a table
    pub async fn start(&self, session: &Arc<Session>, table_id: TableId) {
        let Some(mut table) = self
            .registry
            .resolve(Some(session.as_ref()), table_id, Access::Lock)
            .await
        else {
            return;
        };

        let refused = if table.player_index(session.user_id()).is_none() {
            Some(LifecycleError::NotPlaying(table_id))
        } else if table.running {
            Some(LifecycleError::AlreadyStarted(table_id))
        } else {
            None
        };
        if let Some(err) = refused {
            report(Some(session.as_ref()), &err);
            return;
        }

        table.running = true;
        log::info!("Game at table {} started", table_id);
        self.chat
            .send_server(
                "The game has started.",
                &table_room(table_id),
                Access::Held(&mut *table),
            )
            .await;
    }

    /// Remove a disconnected user from every table they were at
    pub async fn disconnect(&self, session: &Arc<Session>) {
        for (table_id, _) in self.registry.list().await {
            let Some(mut table) = self.registry.resolve(None, table_id, Access::Lock).await else {
                continue;
            };
            if table.seat_of(session.user_id()).is_some()
                && let Err(err) = self.depart(session, &mut *table).await
            {
                log::warn!(
                    "User {} could not leave table {} on disconnect: {}",
                    session.user_id(),
                    table_id,
                    err
                );
            }
        }
    }

    /// Take a user out of a locked table.
    ///
    /// A player leaving a running game ends it for everyone. The last one
    /// out removes the table.
    async fn depart(
        &self,
        session: &Arc<Session>,
        table: &mut LockedTable,
    ) -> Result<(), LifecycleError> {
        let table_id = table.id();
        let user_id = session.user_id();

        let was_player = table.player_index(user_id).is_some();
        if was_player && table.running {
            self.termination
                .terminate(
                    Some(session),
                    TerminateRequest {
                        table_id,
                        server: true,
                    },
                    Access::Held(&mut *table),
                )
                .await;
        }

        let left_player = table.remove_player(user_id).is_some();
        let left_spectator = table.remove_spectator(user_id).is_some();
        if !left_player && !left_spectator {
            return Err(LifecycleError::NotSeated(table_id));
        }
        session.emit(ServerMessage::TableLeft { table_id });

        if table.players.is_empty() && table.spectators.is_empty() {
            // Nobody can be waiting on a table lock while holding the map lock
            self.registry.remove_table(table_id).await;
            return Ok(());
        }

        if left_player {
            let msg = format!("{} left the table.", session.username());
            self.chat
                .send_server(&msg, &table_room(table_id), Access::Held(&mut *table))
                .await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::AppState;
    use tablechat::{ServerMessage, Session, table::LockedTable, termination::EndCondition};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn connect(user_id: i64, name: &str) -> (Arc<Session>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(Session::new(user_id, name, tx)), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn create_seats_creator() {
        let state = AppState::in_memory();
        let (alice, mut rx) = connect(1, "alice");

        let table_id = state.lifecycle.create(&alice, "  Friday  ", false).await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::TableJoined {
                table_id,
                name: "Friday".to_string()
            }]
        );
        let table = state.registry.get(table_id).await.unwrap();
        let locked = LockedTable::lock(table).await;
        assert_eq!(locked.players.len(), 1);
        assert!(!locked.replay);
    }

    #[tokio::test]
    async fn blank_name_is_refused() {
        let state = AppState::in_memory();
        let (alice, mut rx) = connect(1, "alice");

        assert!(state.lifecycle.create(&alice, "   ", false).await.is_none());
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::Warning {
                warning: "Table names cannot be blank.".to_string()
            }]
        );
        assert!(state.registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn cannot_join_running_game() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        state.lifecycle.start(&alice, table_id).await;
        state.lifecycle.join(&bob, table_id).await;

        assert_eq!(
            drain(&mut rx_bob),
            vec![ServerMessage::Warning {
                warning: format!("The game at table {table_id} has already started.")
            }]
        );
    }

    #[tokio::test]
    async fn join_announces_to_the_table() {
        let state = AppState::in_memory();
        let (alice, mut rx_alice) = connect(1, "alice");
        let (bob, _rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        drain(&mut rx_alice);
        state.lifecycle.join(&bob, table_id).await;

        let messages = drain(&mut rx_alice);
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::Chat(chat)] if chat.msg == "bob joined the table." && chat.server
        ));
    }

    #[tokio::test]
    async fn leaving_a_running_game_ends_it() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        state.lifecycle.join(&bob, table_id).await;
        state.lifecycle.start(&alice, table_id).await;
        drain(&mut rx_bob);

        state.lifecycle.leave(&alice, table_id).await;

        let messages = drain(&mut rx_bob);
        assert!(messages.contains(&ServerMessage::GameOver {
            table_id,
            end_condition: EndCondition::Terminated,
            player_index: None,
        }));
        let table = state.registry.get(table_id).await.unwrap();
        let locked = LockedTable::lock(table).await;
        assert!(!locked.running);
        assert_eq!(locked.players.len(), 1);
    }

    #[tokio::test]
    async fn last_one_out_removes_the_table() {
        let state = AppState::in_memory();
        let (alice, mut rx) = connect(1, "alice");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        state.lifecycle.leave(&alice, table_id).await;

        assert!(drain(&mut rx).contains(&ServerMessage::TableLeft { table_id }));
        assert!(state.registry.get(table_id).await.is_none());
    }

    #[tokio::test]
    async fn join_queued_behind_last_leave_finds_no_table() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        let table = state.registry.get(table_id).await.unwrap();
        let held = LockedTable::lock(table.clone()).await;

        let leave = {
            let state = state.clone();
            let alice = alice.clone();
            tokio::spawn(async move { state.lifecycle.leave(&alice, table_id).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let join = {
            let state = state.clone();
            let bob = bob.clone();
            tokio::spawn(async move { state.lifecycle.join(&bob, table_id).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        drop(held);
        leave.await.unwrap();
        join.await.unwrap();

        assert_eq!(
            drain(&mut rx_bob),
            vec![ServerMessage::Warning {
                warning: format!("Table {table_id} does not exist.")
            }]
        );
        assert!(state.registry.get(table_id).await.is_none());
        let orphan = LockedTable::lock(table).await;
        assert!(orphan.players.is_empty());
    }

    #[tokio::test]
    async fn disconnect_without_tables_is_silent() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");
        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();

        state.lifecycle.disconnect(&bob).await;

        assert!(drain(&mut rx_bob).is_empty());
        assert!(state.registry.get(table_id).await.is_some());
    }

    #[tokio::test]
    async fn leaving_a_table_you_are_not_at() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "t", false).await.unwrap();
        state.lifecycle.leave(&bob, table_id).await;

        assert_eq!(
            drain(&mut rx_bob),
            vec![ServerMessage::Warning {
                warning: format!("You are not playing or spectating at table {table_id}.")
            }]
        );
    }

    #[tokio::test]
    async fn replays_are_spectated() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, mut rx_bob) = connect(2, "bob");

        let table_id = state.lifecycle.create(&alice, "replay", true).await.unwrap();
        state.lifecycle.join(&bob, table_id).await;
        assert_eq!(
            drain(&mut rx_bob),
            vec![ServerMessage::Warning {
                warning: format!("You cannot play in replay {table_id}, only spectate it.")
            }]
        );

        state.lifecycle.spectate(&bob, table_id).await;
        let table = state.registry.get(table_id).await.unwrap();
        let locked = LockedTable::lock(table).await;
        assert_eq!(locked.spectators.len(), 2);
        assert!(locked.players.is_empty());
    }

    #[tokio::test]
    async fn disconnect_leaves_every_table() {
        let state = AppState::in_memory();
        let (alice, _rx_alice) = connect(1, "alice");
        let (bob, _rx_bob) = connect(2, "bob");

        let first = state.lifecycle.create(&alice, "one", false).await.unwrap();
        let second = state.lifecycle.create(&bob, "two", false).await.unwrap();
        state.lifecycle.spectate(&alice, second).await;

        state.lifecycle.disconnect(&alice).await;

        assert!(state.registry.get(first).await.is_none());
        let table = state.registry.get(second).await.unwrap();
        let locked = LockedTable::lock(table).await;
        assert!(locked.spectators.is_empty());
        assert_eq!(locked.players.len(), 1);
    }
}
