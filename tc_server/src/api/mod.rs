//! HTTP/WebSocket API for the table chat server.
//!
//! Clients hold one WebSocket each. Everything interactive (chat, typing,
//! table lifecycle and termination) travels over that socket; the HTTP side
//! only offers a health check and the table list.
//!
//! # Modules
//!
//! - [`tables`]: Table listing
//! - [`websocket`]: Per-connection session, client message dispatch
//!
//! # Endpoints Overview
//!
//! - `GET /health` - Server health status
//! - `GET /api/tables` - List all tables
//! - `GET /ws?username=<name>` - Establish WebSocket connection
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tc_server::api::{AppState, create_router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_router(AppState::in_memory());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:6969").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development.

pub mod tables;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};
use tablechat::{
    ChatService, InMemorySessionDirectory, TableRegistry, TerminationGate, TypingTracker,
    bridge::{ChatBridge, DisabledBridge},
    chat::BuiltinChatCommands,
    db::{ChatLogRepository, Database, MemoryChatLogRepository},
};
use tower_http::cors::CorsLayer;

use crate::{actions::GameActions, lifecycle::TableLifecycle};

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TableRegistry>,
    pub sessions: Arc<InMemorySessionDirectory>,
    pub chat: Arc<ChatService>,
    pub typing: TypingTracker,
    pub termination: Arc<TerminationGate>,
    pub lifecycle: Arc<TableLifecycle>,
    /// Present when the chat log is kept in PostgreSQL
    pub database: Option<Database>,
    next_user_id: Arc<AtomicI64>,
    /// Capacity of each session's outbound queue
    pub outbound_buffer: usize,
}

impl AppState {
    /// Wire up the chat services around a chat log and a relay
    ///
    /// # Arguments
    ///
    /// * `chat_log` - Where lobby chat is persisted
    /// * `bridge` - External relay for lobby chat
    /// * `database` - Database behind `chat_log`, if any, for health checks
    /// * `outbound_buffer` - Capacity of each session's outbound queue
    pub fn new(
        chat_log: Arc<dyn ChatLogRepository>,
        bridge: Arc<dyn ChatBridge>,
        database: Option<Database>,
        outbound_buffer: usize,
    ) -> Self {
        let registry = Arc::new(TableRegistry::new());
        let sessions = Arc::new(InMemorySessionDirectory::new());

        let termination = Arc::new(TerminationGate::new(
            registry.clone(),
            Arc::new(GameActions),
        ));
        let commands = Arc::new(BuiltinChatCommands::new(termination.clone()));
        let chat = Arc::new(ChatService::new(
            registry.clone(),
            sessions.clone(),
            chat_log,
            bridge,
            commands,
        ));
        let typing = TypingTracker::new(registry.clone());
        let lifecycle = Arc::new(TableLifecycle::new(
            registry.clone(),
            chat.clone(),
            termination.clone(),
        ));

        Self {
            registry,
            sessions,
            chat,
            typing,
            termination,
            lifecycle,
            database,
            next_user_id: Arc::new(AtomicI64::new(1)),
            outbound_buffer,
        }
    }

    /// State with an in-memory chat log and no relay
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryChatLogRepository::new()),
            Arc::new(DisabledBridge),
            None,
            256,
        )
    }

    /// Allocate an id for a new connection. Ids start at 1.
    pub fn next_user_id(&self) -> i64 {
        self.next_user_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Create the API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state
///
/// # Returns
///
/// Configured Axum router ready to serve requests
///
/// ```text
/// GET  /health                 - Health check
/// GET  /api/tables             - List tables
/// GET  /ws?username=<name>     - WebSocket
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/tables", get(tables::list_tables))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the chat log database (if configured) answers, and
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":true,"tables":2,"sessions":5,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(database) => database.health_check().await.is_ok(),
        None => true,
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "database": db_healthy,
        "tables": state.registry.list().await.len(),
        "sessions": state.sessions.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(body))
}
