//! Table registry with get-and-lock semantics.

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{OwnedMutexGuard, RwLock};

use super::entities::{Table, TableId, TableState};
use crate::session::Session;

/// A table whose lock is held for as long as this value lives
pub struct LockedTable {
    table: Arc<Table>,
    guard: OwnedMutexGuard<TableState>,
}

impl LockedTable {
    /// Wait for the table's lock
    pub async fn lock(table: Arc<Table>) -> Self {
        let guard = table.state.clone().lock_owned().await;
        Self { table, guard }
    }

    pub fn id(&self) -> TableId {
        self.table.id()
    }

    pub fn generation(&self) -> u64 {
        self.table.generation()
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }
}

impl Deref for LockedTable {
    type Target = TableState;

    fn deref(&self) -> &TableState {
        &self.guard
    }
}

impl DerefMut for LockedTable {
    fn deref_mut(&mut self) -> &mut TableState {
        &mut self.guard
    }
}

/// How a table-scoped operation gets hold of the table's lock
pub enum Access<'a> {
    /// Wait for the lock and release it when the operation returns
    Lock,
    /// The caller already holds the lock and lends its guard
    Held(&'a mut LockedTable),
}

/// A resolved table, either locked by this call or borrowed from the caller
pub enum TableRef<'a> {
    Owned(LockedTable),
    Borrowed(&'a mut LockedTable),
}

impl Deref for TableRef<'_> {
    type Target = LockedTable;

    fn deref(&self) -> &LockedTable {
        match self {
            TableRef::Owned(table) => table,
            TableRef::Borrowed(table) => &**table,
        }
    }
}

impl DerefMut for TableRef<'_> {
    fn deref_mut(&mut self) -> &mut LockedTable {
        match self {
            TableRef::Owned(table) => table,
            TableRef::Borrowed(table) => &mut **table,
        }
    }
}

/// Registry mapping table ids to live tables
pub struct TableRegistry {
    /// Live tables; this lock is never held while waiting on a table lock
    tables: RwLock<HashMap<TableId, Arc<Table>>>,

    next_table_id: AtomicU64,

    next_generation: AtomicU64,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Create a table under the next free id
    pub async fn create_table(&self, name: impl Into<String>) -> Arc<Table> {
        let id = self.next_table_id.fetch_add(1, Ordering::Relaxed);
        self.insert_with_id(id, name).await
    }

    /// Create a table under a given id, replacing any table registered there.
    ///
    /// The new table always gets a fresh generation, so work captured against
    /// the replaced table can tell the two apart.
    pub async fn insert_with_id(&self, id: TableId, name: impl Into<String>) -> Arc<Table> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(Table::new(id, generation, name.into()));

        self.next_table_id.fetch_max(id + 1, Ordering::Relaxed);

        let mut tables = self.tables.write().await;
        if tables.insert(id, table.clone()).is_some() {
            log::info!("Table {} replaced (generation {})", id, generation);
        } else {
            log::info!("Table {} created (generation {})", id, generation);
        }
        table
    }

    /// Unregister a table. Holders of its lock keep their guard until they drop it.
    pub async fn remove_table(&self, id: TableId) -> Option<Arc<Table>> {
        let mut tables = self.tables.write().await;
        let removed = tables.remove(&id);
        if removed.is_some() {
            log::info!("Table {} removed", id);
        }
        removed
    }

    /// Look up a table without locking it
    pub async fn get(&self, id: TableId) -> Option<Arc<Table>> {
        let tables = self.tables.read().await;
        tables.get(&id).cloned()
    }

    /// Ids and names of all live tables, ordered by id
    pub async fn list(&self) -> Vec<(TableId, String)> {
        let tables = self.tables.read().await;
        let mut list: Vec<_> = tables
            .values()
            .map(|t| (t.id(), t.name().to_string()))
            .collect();
        list.sort_by_key(|(id, _)| *id);
        list
    }

    /// Resolve a table for a table-scoped operation.
    ///
    /// With [`Access::Lock`] this waits for the table's lock and the returned
    /// value releases it on drop. A table removed or replaced while waiting
    /// counts as not found. With [`Access::Held`] the caller's guard is
    /// handed back untouched.
    ///
    /// # Arguments
    ///
    /// * `session` - Session to warn when the table does not exist; `None`
    ///   for server triggered work, which fails silently
    /// * `table_id` - Table to resolve
    /// * `access` - Whether to lock or reuse a held lock
    ///
    /// # Returns
    ///
    /// * `Option<TableRef>` - The table, or `None` if it does not exist
    pub async fn resolve<'a>(
        &self,
        session: Option<&Session>,
        table_id: TableId,
        access: Access<'a>,
    ) -> Option<TableRef<'a>> {
        match access {
            Access::Held(table) => {
                if table.id() != table_id {
                    log::error!(
                        "Held lock belongs to table {} but table {} was requested",
                        table.id(),
                        table_id
                    );
                    return None;
                }
                Some(TableRef::Borrowed(table))
            }
            Access::Lock => {
                let locked = match self.get(table_id).await {
                    Some(table) => Some(LockedTable::lock(table).await),
                    None => None,
                };
                match locked {
                    Some(locked) if self.is_current(&locked).await => {
                        Some(TableRef::Owned(locked))
                    }
                    _ => {
                        if let Some(session) = session {
                            session.warning(format!("Table {} does not exist.", table_id));
                        }
                        None
                    }
                }
            }
        }
    }

    /// Whether a locked table is still the one registered under its id.
    ///
    /// A table can be removed or replaced while someone waits for its lock;
    /// the waiter must then treat it as gone.
    pub async fn is_current(&self, table: &LockedTable) -> bool {
        let tables = self.tables.read().await;
        tables
            .get(&table.id())
            .is_some_and(|t| t.generation() == table.generation())
    }
}
