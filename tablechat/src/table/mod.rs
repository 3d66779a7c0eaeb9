//! Tables and the lock manager that serializes access to them.
//!
//! This module implements:
//! - `Table`: a shared table with a single mutex around its mutable state
//! - `LockedTable`: the guard proving a table's lock is held
//! - `TableRegistry`: id to table lookup with get-and-lock semantics
//!
//! ## Locking
//!
//! Only one table lock is held at a time. Code that already holds a table's
//! lock passes its guard down as [`Access::Held`] instead of locking again.

pub mod entities;
pub mod registry;

pub use entities::{Participant, Seat, Table, TableChatMessage, TableId, TableState};
pub use registry::{Access, LockedTable, TableRef, TableRegistry};
