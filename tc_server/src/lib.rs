//! WebSocket chat server for shared game tables.
//!
//! Wires the `tablechat` core to real connections: an axum router, a
//! PostgreSQL or in-memory chat log, an optional webhook relay and a small
//! table lifecycle.

pub mod actions;
pub mod api;
pub mod bridge;
pub mod config;
pub mod lifecycle;
pub mod logging;
