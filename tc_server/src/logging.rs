//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; the subscriber installed
//! here picks those records up alongside native `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Levels are taken from `RUST_LOG`, defaulting to `info` with quieter
/// database and HTTP internals.
///
/// # Example
///
/// ```no_run
/// use tc_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a connection opening or closing
///
/// # Arguments
///
/// * `event` - `connected` or `disconnected`
/// * `user_id` - Id assigned to the connection
/// * `username` - Display name the client asked for
pub fn log_connection_event(event: &str, user_id: i64, username: &str) {
    tracing::info!(
        event = event,
        user_id = user_id,
        username = username,
        "WebSocket {}",
        event
    );
}

/// Log an inbound client request
///
/// # Arguments
///
/// * `kind` - Request type as sent on the wire
/// * `user_id` - Requesting user
/// * `table_id` - Table the request targets, if any
pub fn log_client_request(kind: &str, user_id: i64, table_id: Option<u64>) {
    tracing::debug!(
        request = kind,
        user_id = user_id,
        table_id = table_id,
        "Client request"
    );
}

/// Log a client message that could not be parsed
pub fn log_rejected_message(user_id: i64, reason: &str) {
    tracing::warn!(user_id = user_id, reason = reason, "Rejected client message");
}
