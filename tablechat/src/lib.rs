//! # Tablechat
//!
//! Real-time message routing for participants of shared game tables.
//!
//! Every table carries exactly one lock. All reads and writes of table state
//! go through a [`table::LockedTable`] guard, so concurrent chat, typing and
//! termination requests against the same table are serialized. Delayed work
//! (the typing timeout) re-validates the table's generation when it wakes
//! instead of relying on cancellation.
//!
//! ## Core Modules
//!
//! - [`table`]: Table registry, per-table lock manager and table entities
//! - [`session`]: Connected sessions and the session directory
//! - [`chat`]: Chat pipeline, embedded commands and the typing tracker
//! - [`termination`]: Validation and forwarding of termination requests
//! - [`bridge`]: External chat relay collaborator
//! - [`db`]: Chat log persistence
//!
//! ## Example
//!
//! ```
//! use tablechat::table::{Access, TableRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = TableRegistry::new();
//! let table = registry.create_table("Table 1").await;
//!
//! // Lock the table for the duration of the request
//! let locked = registry.resolve(None, table.id(), Access::Lock).await;
//! assert!(locked.is_some());
//! # }
//! ```

pub mod bridge;
pub mod chat;
pub mod constants;
pub mod db;
pub mod errors;
pub mod messages;
pub mod scheduler;
pub mod session;
pub mod table;
pub mod termination;

pub use chat::{ChatRequest, ChatService, TypingTracker};
pub use messages::{ChatMessage, ServerMessage};
pub use session::{InMemorySessionDirectory, Session, SessionDirectory};
pub use table::{Access, LockedTable, TableId, TableRegistry};
pub use termination::{TerminateRequest, TerminationGate};
