//! Typing indicators.
//!
//! A report marks the participant as typing and schedules a recheck
//! [`TYPING_DELAY`] later. The recheck clears the flag if no newer report
//! arrived in the meantime. Rechecks are never cancelled; instead they bail
//! out when the table they were scheduled for is gone or has been replaced
//! by a table with a different generation.

use std::sync::Arc;
use tokio::time::Instant;

use super::errors::TypingError;
use crate::{
    constants::TYPING_DELAY,
    errors::report,
    scheduler::{Scheduler, TokioScheduler},
    session::Session,
    table::{Access, LockedTable, Seat, TableId, TableRegistry, TableState},
};

/// Tracks who is typing at which table
#[derive(Clone)]
pub struct TypingTracker {
    registry: Arc<TableRegistry>,
    scheduler: Arc<dyn Scheduler>,
}

impl TypingTracker {
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self::with_scheduler(registry, Arc::new(TokioScheduler))
    }

    pub fn with_scheduler(registry: Arc<TableRegistry>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    /// Handle a keystroke report from a user at a table.
    ///
    /// Everyone else at the table is told when the user starts typing;
    /// repeated reports only extend the typing window.
    ///
    /// # Arguments
    ///
    /// * `session` - The typist
    /// * `table_id` - Table they are typing at
    /// * `access` - Whether the table's lock is already held
    pub async fn report(&self, session: &Arc<Session>, table_id: TableId, access: Access<'_>) {
        if let Err(err) = self.try_report(session, table_id, access).await {
            report(Some(session.as_ref()), &err);
        }
    }

    async fn try_report(
        &self,
        session: &Arc<Session>,
        table_id: TableId,
        access: Access<'_>,
    ) -> Result<(), TypingError> {
        let Some(mut table) = self
            .registry
            .resolve(Some(session.as_ref()), table_id, access)
            .await
        else {
            return Ok(());
        };

        let user_id = session.user_id();
        let seat = seat_for_typing(&table, table.id(), user_id)?;
        let generation = table.generation();

        let Some(participant) = table.participant_mut(seat) else {
            return Ok(());
        };
        participant.last_typed = Some(Instant::now());
        let started = !participant.typing;
        participant.typing = true;
        let name = participant.name.clone();

        if started {
            table.notify_typing(user_id, &name, true);
        }

        let registry = self.registry.clone();
        self.scheduler.schedule(
            TYPING_DELAY,
            Box::pin(check_stopped(registry, table_id, generation, user_id)),
        );

        Ok(())
    }
}

/// Find the seat a typing report applies to.
///
/// Replays only accept typing from spectators.
fn seat_for_typing(
    state: &TableState,
    table_id: TableId,
    user_id: i64,
) -> Result<Seat, TypingError> {
    let seat = state
        .seat_of(user_id)
        .ok_or(TypingError::NotAtTable(table_id))?;
    if state.replay && !seat.is_spectator() {
        return Err(TypingError::NotSpectatingReplay(table_id));
    }
    Ok(seat)
}

/// Clear a stale typing flag.
///
/// Runs [`TYPING_DELAY`] after a report. Does nothing if the table has been
/// removed or re-created since the report, if the user left, or if they typed
/// again within the window.
///
/// # Arguments
///
/// * `registry` - Registry to look the table up in again
/// * `table_id` - Table the report was made at
/// * `generation` - Generation of that table when the report was made
/// * `user_id` - The typist
pub async fn check_stopped(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    generation: u64,
    user_id: i64,
) {
    let Some(table) = registry.get(table_id).await else {
        return;
    };
    if table.generation() != generation {
        log::debug!(
            "Skipping typing recheck for table {}: generation {} was replaced by {}",
            table_id,
            generation,
            table.generation()
        );
        return;
    }

    let mut table = LockedTable::lock(table).await;
    if !registry.is_current(&table).await {
        return;
    }

    // They left shortly after typing; leaving already cleared the flag
    let Ok(seat) = seat_for_typing(&table, table_id, user_id) else {
        return;
    };
    let Some(participant) = table.participant_mut(seat) else {
        return;
    };
    if !participant.typing {
        return;
    }
    if !participant
        .last_typed
        .is_some_and(|t| t.elapsed() >= TYPING_DELAY)
    {
        return;
    }

    participant.typing = false;
    let name = participant.name.clone();
    table.notify_typing(user_id, &name, false);
}
