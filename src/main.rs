//! realpick · quiz backend server
//!
//! - Axum HTTP API under /api/v1
//! - Pluggable interpretation generator (OpenAI vision, command shim, fixtures)
//! - Quiz metadata kept as one JSON document next to the images
//!
//! Important env variables (see `config.rs` for the full list):
//!   PORT                 : u16 (default 8080)
//!   STORAGE_BACKEND      : "local" (default, under DATA_DIR) or "memory"
//!   GENERATOR            : "openai" | "command" | "fixture"
//!   OPENAI_API_KEY       : enables the OpenAI generator by default
//!   METADATA_CONSISTENCY : "last_writer_wins" (default) or "serialized"
//!   QUIZ_CONFIG_PATH     : TOML with prompts and fixture interpretations
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use realpick::config::AppConfig;
use realpick::routes::build_router;
use realpick::state::AppState;
use realpick::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::from_env().inspect_err(|e| {
    error!(target: "realpick", error = %e, "Invalid configuration");
  })?;

  // Wire object store, metadata store, generator and service.
  let state = Arc::new(AppState::from_config(&cfg).await?);

  let app = build_router(state);

  let addr = cfg.bind_addr();
  let listener = TcpListener::bind(addr).await?;
  info!(target: "realpick", %addr, public_base_url = %cfg.public_base_url, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "realpick", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(target: "realpick", error = %e, "Failed to listen for Ctrl-C");
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!(target: "realpick", error = %e, "Failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "realpick", "Shutdown signal received");
}
