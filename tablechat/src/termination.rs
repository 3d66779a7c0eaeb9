//! Termination of running games.
//!
//! A termination request is validated and forwarded as an end-game action
//! while the table's lock stays held, so nothing can change the table
//! between the checks and the action.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    errors::{Severity, UserFacing, report},
    session::Session,
    table::{Access, LockedTable, TableId, TableRegistry, TableState},
};

/// Kinds of in-game actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    EndGame,
}

/// How a game came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCondition {
    Normal,
    Terminated,
}

/// An action addressed to a table's game logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameAction {
    pub table_id: TableId,
    pub kind: ActionType,
    /// Player index the action is about; `None` when the server acts
    pub target: Option<usize>,
    pub value: EndCondition,
}

/// Executes game actions
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Apply an action to a table whose lock the caller holds
    async fn handle_action(
        &self,
        session: Option<&Arc<Session>>,
        action: GameAction,
        table: &mut LockedTable,
    );
}

/// A request to end a table's game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateRequest {
    pub table_id: TableId,
    /// The server terminates, so the requester need not be playing
    #[serde(default)]
    pub server: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminateError {
    #[error("You are not playing at table {0}, so you cannot terminate it.")]
    NotPlaying(TableId),

    #[error("You can not terminate a game that has not started yet.")]
    NotStarted,

    #[error("You can not terminate a replay.")]
    Replay,

    #[error("Failed to terminate table {0} because the request had no session.")]
    MissingSession(TableId),
}

impl UserFacing for TerminateError {
    fn severity(&self) -> Severity {
        match self {
            TerminateError::MissingSession(_) => Severity::Internal,
            _ => Severity::Warning,
        }
    }
}

/// Validates termination requests and forwards them to the game logic
pub struct TerminationGate {
    registry: Arc<TableRegistry>,
    actions: Arc<dyn ActionHandler>,
}

impl TerminationGate {
    pub fn new(registry: Arc<TableRegistry>, actions: Arc<dyn ActionHandler>) -> Self {
        Self { registry, actions }
    }

    /// Terminate a table's game.
    ///
    /// # Arguments
    ///
    /// * `session` - The requester; may be `None` for server requests
    /// * `request` - Table to terminate
    /// * `access` - Whether the table's lock is already held
    pub async fn terminate(
        &self,
        session: Option<&Arc<Session>>,
        request: TerminateRequest,
        access: Access<'_>,
    ) {
        let session_ref = session.map(Arc::as_ref);

        if !request.server && session.is_none() {
            report(session_ref, &TerminateError::MissingSession(request.table_id));
            return;
        }

        let Some(mut table) = self
            .registry
            .resolve(session_ref, request.table_id, access)
            .await
        else {
            return;
        };

        let target = match validate(&table, table.id(), session, request.server) {
            Ok(target) => target,
            Err(err) => {
                report(session_ref, &err);
                return;
            }
        };

        log::info!(
            "Terminating table {} (requested by {})",
            table.id(),
            session.map_or("the server", |s| s.username())
        );

        let action = GameAction {
            table_id: table.id(),
            kind: ActionType::EndGame,
            target,
            value: EndCondition::Terminated,
        };
        self.actions
            .handle_action(session, action, &mut *table)
            .await;
    }
}

/// Check a termination request against the table, returning the requester's
/// player index
fn validate(
    state: &TableState,
    table_id: TableId,
    session: Option<&Arc<Session>>,
    server: bool,
) -> Result<Option<usize>, TerminateError> {
    let target = if server {
        None
    } else {
        let user_id = session
            .map(|s| s.user_id())
            .ok_or(TerminateError::MissingSession(table_id))?;
        Some(
            state
                .player_index(user_id)
                .ok_or(TerminateError::NotPlaying(table_id))?,
        )
    };

    if !state.running {
        return Err(TerminateError::NotStarted);
    }
    if state.replay {
        return Err(TerminateError::Replay);
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Participant;

    fn player(user_id: i64) -> Participant {
        Participant::new(user_id, format!("user{user_id}"), None)
    }

    fn session(user_id: i64) -> Arc<Session> {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        Arc::new(Session::new(user_id, format!("user{user_id}"), tx))
    }

    #[test]
    fn spectator_cannot_terminate() {
        let mut state = TableState {
            running: true,
            ..Default::default()
        };
        state.add_player(player(1));
        state.add_spectator(player(2));

        assert_eq!(
            validate(&state, 7, Some(&session(2)), false),
            Err(TerminateError::NotPlaying(7))
        );
        assert_eq!(validate(&state, 7, Some(&session(1)), false), Ok(Some(0)));
    }

    #[test]
    fn checks_run_in_order() {
        let mut state = TableState::default();
        state.add_player(player(1));
        state.replay = true;

        // Not running is reported before replay
        assert_eq!(
            validate(&state, 7, Some(&session(1)), false),
            Err(TerminateError::NotStarted)
        );

        state.running = true;
        assert_eq!(
            validate(&state, 7, Some(&session(1)), false),
            Err(TerminateError::Replay)
        );
    }

    #[test]
    fn server_skips_player_check() {
        let state = TableState {
            running: true,
            ..Default::default()
        };
        assert_eq!(validate(&state, 7, None, true), Ok(None));
    }

    #[test]
    fn request_deserializes() {
        let request: TerminateRequest = serde_json::from_str(r#"{"table_id":3}"#).unwrap();
        assert_eq!(
            request,
            TerminateRequest {
                table_id: 3,
                server: false
            }
        );
    }

    #[test]
    fn end_condition_wire_names() {
        assert_eq!(
            serde_json::to_string(&EndCondition::Terminated).unwrap(),
            "\"terminated\""
        );
    }
}
