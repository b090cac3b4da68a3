//! Startup helpers shared by the Loquat binaries.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::history::SqliteHistoryStore;
use crate::llm::OllamaClient;
use crate::server::{self, AppState};

/// Environment variable overriding the server port.
const PORT_ENV: &str = "LOQUAT_PORT";
/// Environment variable overriding the SQLite database path.
const DB_ENV: &str = "LOQUAT_DB";
/// Default SQLite database path.
const DEFAULT_DB: &str = "loquat.db";

/// Install the tracing subscriber for the server: INFO by default,
/// overridable through `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Install the tracing subscriber for the interactive client: quiet by
/// default (WARN) and on stderr, so log lines stay out of the transcript.
pub fn init_client_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the relay server.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run_server() -> ExitCode {
    init_tracing();
    tracing::info!("Starting Loquat relay v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve()) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn serve() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ollama = OllamaClient::from_env()?;
    if ollama.is_ready().await {
        tracing::info!("Initial check: Ollama detected and online.");
    } else {
        tracing::warn!("Initial check failed: the Ollama service appears to be offline.");
    }

    let conn = Connection::open(db_path()).await?;
    let history = SqliteHistoryStore::new(Arc::new(conn)).await?;
    let state = AppState::new(ollama, Arc::new(history));

    server::run_server(state, get_port()).await
}

/// Configured server port.
#[must_use]
pub fn get_port() -> u16 {
    std::env::var(PORT_ENV)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(server::DEFAULT_PORT)
}

/// Configured SQLite database path.
#[must_use]
pub fn db_path() -> String {
    std::env::var(DB_ENV).unwrap_or_else(|_| DEFAULT_DB.to_string())
}
