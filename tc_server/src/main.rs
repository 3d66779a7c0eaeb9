//! Table chat server.
//!
//! Loads configuration, connects the chat log and relay, and serves the
//! HTTP/WebSocket API until Ctrl+C.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use pico_args::Arguments;
use tablechat::{
    bridge::{ChatBridge, DisabledBridge},
    db::{ChatLogRepository, Database, MemoryChatLogRepository, PgChatLogRepository},
};
use tc_server::{api, bridge::WebhookBridge, config::ServerConfig, logging};
use tracing::{info, warn};

const HELP: &str = "\
Run the table chat server

USAGE:
  tc_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Chat log database           [default: env DATABASE_URL, in-memory when unset]
  --tables     N           Number of tables to create  [default: env INITIAL_TABLES or 0]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Chat log pool size
  BRIDGE_WEBHOOK_URL       Webhook lobby chat is relayed to
  BRIDGE_TIMEOUT_SECS      Webhook request timeout
  CHAT_OUTBOUND_BUFFER     Per-session outbound queue capacity
  RUST_LOG                 Log filter (e.g., debug,sqlx=warn)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let num_tables: Option<usize> = pargs.opt_value_from_str("--tables")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url, num_tables)?;
    config.validate()?;
    info!("Starting table chat server at {}", config.bind);

    let (chat_log, database): (Arc<dyn ChatLogRepository>, Option<Database>) =
        match &config.database {
            Some(db_config) => {
                let database = Database::new(db_config)
                    .await
                    .context("Failed to connect to database")?;
                info!("Chat log database connected");
                let chat_log: Arc<dyn ChatLogRepository> =
                    Arc::new(PgChatLogRepository::new(database.pool().clone()));
                (chat_log, Some(database))
            }
            None => {
                warn!("DATABASE_URL not set, chat log is kept in memory");
                let chat_log: Arc<dyn ChatLogRepository> = Arc::new(MemoryChatLogRepository::new());
                (chat_log, None)
            }
        };

    let bridge: Arc<dyn ChatBridge> = match &config.bridge.webhook_url {
        Some(url) => {
            info!("Relaying lobby chat to webhook");
            Arc::new(WebhookBridge::new(
                url.as_str(),
                Duration::from_secs(config.bridge.timeout_secs),
            )?)
        }
        None => Arc::new(DisabledBridge),
    };

    let state = api::AppState::new(chat_log, bridge, database.clone(), config.outbound_buffer);

    for i in 0..config.num_tables {
        let table = state.registry.create_table(format!("Table {}", i + 1)).await;
        info!("Created table {} ({})", table.id(), table.name());
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    if let Some(database) = database {
        database.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
