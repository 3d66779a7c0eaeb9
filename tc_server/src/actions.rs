//! Game actions executed by the server.

use async_trait::async_trait;
use std::sync::Arc;
use tablechat::{
    ServerMessage, Session,
    table::LockedTable,
    termination::{ActionHandler, ActionType, GameAction},
};

/// The server's game logic, reduced to ending games
#[derive(Debug, Default, Clone, Copy)]
pub struct GameActions;

#[async_trait]
impl ActionHandler for GameActions {
    async fn handle_action(
        &self,
        session: Option<&Arc<Session>>,
        action: GameAction,
        table: &mut LockedTable,
    ) {
        match action.kind {
            ActionType::EndGame => {
                if !table.running {
                    log::debug!("Table {} is not running, nothing to end", table.id());
                    return;
                }

                let state = &mut **table;
                state.running = false;
                for participant in state.players.iter_mut().chain(state.spectators.iter_mut()) {
                    participant.typing = false;
                }

                log::info!(
                    "Game at table {} ended ({:?}) by {}",
                    table.id(),
                    action.value,
                    session.map_or("the server", |s| s.username())
                );

                table.notify_all(&ServerMessage::GameOver {
                    table_id: table.id(),
                    end_condition: action.value,
                    player_index: action.target,
                });
            }
        }
    }
}
