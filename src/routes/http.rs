//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures become `{message}` JSON with a status code.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::StoredAdventure;
use crate::error::QuestError;
use crate::logic::*;
use crate::model::ProgressReporter;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_catalog() -> impl IntoResponse { Json(catalog()) }

/// Generate without a progress stream; use the WebSocket to watch model downloads.
#[instrument(level = "info", skip(state, body), fields(difficulty = body.difficulty.code(), language = body.language.code(), text_len = body.text.len()))]
pub async fn http_post_adventure(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Result<Json<StoredAdventure>, QuestError> {
  let adventure = generate_adventure(&state, body, ProgressReporter::noop()).await?;
  info!(target: "generation", id = %adventure.id, "HTTP adventure generated");
  Ok(Json(adventure))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_latest(State(state): State<Arc<AppState>>) -> Result<Json<StoredAdventure>, QuestError> {
  state.latest().await.map(Json).ok_or(QuestError::NoAdventure)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_game(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartGameIn>,
) -> Result<Json<GameView>, QuestError> {
  Ok(Json(start_game(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Json(body): Json<HotspotIn>,
) -> Result<Json<GameView>, QuestError> {
  Ok(Json(select_hotspot(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_hotspot(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HotspotIn>,
) -> Result<Json<HotspotDetailOut>, QuestError> {
  Ok(Json(view_hotspot(&state, q).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_replay(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ReplayIn>,
) -> Result<Json<GameView>, QuestError> {
  Ok(Json(replay(&state, body).await?))
}
