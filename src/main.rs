//! Doodle Quest · adventure generator backend
//!
//! Turns page text into a "find the valid steps" mini-game:
//! - An on-device model (local Ollama daemon) generates a scene with valid and distractor hotspots
//! - Axum HTTP + WebSocket API (WebSocket streams model download progress)
//! - Hotspot game state machine with win/loss and replay
//! - Static results page fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   QUEST_CONFIG_PATH : path to TOML config ([model], [prompt])
//!   OLLAMA_BASE_URL   : overrides [model].base_url (default "http://127.0.0.1:11434")
//!   QUEST_MODEL       : overrides [model].model (default "gemma3:1b")
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod catalog;
mod domain;
mod error;
mod config;
mod prompt;
mod model;
mod ollama;
mod generation;
mod page;
mod game;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = config::load_from_env();
  let state = Arc::new(AppState::new(&cfg)?);
  state.log_model_availability().await;

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "doodle_quest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "doodle_quest", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "doodle_quest", "Shutdown requested");
}
