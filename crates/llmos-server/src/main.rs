//! Binary entrypoint for the LLMOS Bridge daemon.
//!
//! Reads configuration from `LLMOS_*` environment variables:
//! - `LLMOS_DB_PATH`: SQLite database file path (default: "llmos.db")
//! - `LLMOS_PORT`: listen port (default: "8765")
//! - `LLMOS_PROFILE`: strict | standard | permissive
//! - `LLMOS_INTENT_VERIFIER`: off | permissive | strict
//! See `config.rs` for the full list.

use llmos_server::config::ServerConfig;
use llmos_server::router::build_router;
use llmos_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let port = config.port;

    let state = AppState::new(config).expect("Failed to initialize application state");
    state.spawn_retention_sweep();

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("llmos-bridge daemon starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}
