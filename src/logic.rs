//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Generating an adventure from extracted page data (and storing it as latest)
//!   - Starting, playing and replaying hotspot games

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::StoredAdventure;
use crate::error::QuestError;
use crate::game::{GameState, Phase};
use crate::generation::{generate, GenerationRequest};
use crate::model::ProgressReporter;
use crate::page::{decode_image, require_text};
use crate::protocol::{to_view, GameView, GenerateIn, HotspotDetailOut, HotspotIn, ReplayIn, StartGameIn};
use crate::state::{AppState, LiveGame};

#[instrument(level = "info", skip(state, input, progress), fields(difficulty = input.difficulty.code(), language = input.language.code(), text_len = input.text.len()))]
pub async fn generate_adventure(
  state: &AppState,
  input: GenerateIn,
  progress: ProgressReporter,
) -> Result<StoredAdventure, QuestError> {
  let page_text = require_text(&input.text)?.to_string();
  let image = decode_image(input.image_data_url.as_deref());
  let request = GenerationRequest { page_text, image, difficulty: input.difficulty, language: input.language };

  let scenes = {
    let _gate = state.generation_gate.lock().await;
    generate(state.model.as_ref(), request, progress, &state.prompt).await?
  };

  let adventure = StoredAdventure {
    id: Uuid::new_v4().to_string(),
    scenes,
    difficulty: input.difficulty,
    language: input.language,
  };
  state.store_latest(adventure.clone()).await;
  info!(target: "generation", id = %adventure.id, theme = %adventure.scenes[0].theme, "Adventure stored");
  Ok(adventure)
}

#[instrument(level = "info", skip(state))]
pub async fn start_game(state: &AppState, input: StartGameIn) -> Result<GameView, QuestError> {
  let adventure = state.latest().await.ok_or(QuestError::NoAdventure)?;
  if let Some(id) = &input.adventure_id {
    if *id != adventure.id {
      return Err(QuestError::UnknownAdventure(id.clone()));
    }
  }
  let scene = adventure
    .scenes
    .get(input.scene_index)
    .cloned()
    .ok_or(QuestError::UnknownScene(input.scene_index))?;

  let game = GameState::new(scene, &mut rand::thread_rng())?;
  let id = Uuid::new_v4().to_string();
  let view = to_view(&id, &game);
  state.games.write().await.insert(id.clone(), LiveGame { adventure_id: adventure.id.clone(), game });
  info!(target: "game", game_id = %id, adventure_id = %adventure.id, hotspots = view.cards.len(), valid = view.valid_total, "Game started");
  Ok(view)
}

#[instrument(level = "info", skip(state))]
pub async fn select_hotspot(state: &AppState, input: HotspotIn) -> Result<GameView, QuestError> {
  let mut games = state.games.write().await;
  let game = &mut games
    .get_mut(&input.game_id)
    .ok_or_else(|| QuestError::UnknownGame(input.game_id.clone()))?
    .game;
  let phase = game.select(input.position)?;
  match phase {
    Phase::Playing => info!(target: "game", game_id = %input.game_id, position = input.position, correct = game.correct_count(), "Hotspot selected"),
    Phase::Won => info!(target: "game", game_id = %input.game_id, "Game won"),
    Phase::Lost => info!(target: "game", game_id = %input.game_id, position = input.position, "Game lost"),
  }
  Ok(to_view(&input.game_id, game))
}

#[instrument(level = "debug", skip(state))]
pub async fn view_hotspot(state: &AppState, input: HotspotIn) -> Result<HotspotDetailOut, QuestError> {
  let games = state.games.read().await;
  let game = &games
    .get(&input.game_id)
    .ok_or_else(|| QuestError::UnknownGame(input.game_id.clone()))?
    .game;
  let h = game.view(input.position)?;
  Ok(HotspotDetailOut {
    position: input.position,
    pop_up_text: h.pop_up_text.clone(),
    description: h.description.clone(),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn replay(state: &AppState, input: ReplayIn) -> Result<GameView, QuestError> {
  let fresh = if input.use_latest {
    let adventure = state.latest().await.ok_or(QuestError::NoAdventure)?;
    let scene = adventure.scenes.into_iter().next().ok_or(QuestError::UnknownScene(0))?;
    Some((adventure.id, scene))
  } else {
    None
  };

  let mut games = state.games.write().await;
  let entry = games
    .get_mut(&input.game_id)
    .ok_or_else(|| QuestError::UnknownGame(input.game_id.clone()))?;
  match fresh {
    Some((adventure_id, scene)) => {
      entry.game.replay_with(scene, &mut rand::thread_rng())?;
      entry.adventure_id = adventure_id;
    }
    None => entry.game.replay(&mut rand::thread_rng()),
  }
  info!(target: "game", game_id = %input.game_id, use_latest = input.use_latest, "Game replayed");
  Ok(to_view(&input.game_id, &entry.game))
}
