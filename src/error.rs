//! Error taxonomy for one user action, and its mapping to user-facing messages
//! and HTTP responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::game::GameError;

const GENERATION_MESSAGE: &str = "The AI had trouble drawing the adventure. Please try again!";
const EXTRACTION_MESSAGE: &str = "Failed to read the page. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum QuestError {
  /// Capability absent or reporting unavailable. Terminal for this attempt.
  #[error("language model unavailable: {0}")]
  ModelUnavailable(String),
  /// Runtime failure while creating or prompting the session.
  #[error("generation failed: {0}")]
  GenerationFailed(String),
  /// The model answered but the answer violates the output contract.
  #[error("malformed generation result: {0}")]
  MalformedGenerationResult(String),
  #[error("content extraction failed: {0}")]
  ContentExtractionFailed(String),

  #[error("no adventure has been generated yet")]
  NoAdventure,
  #[error("unknown adventure: {0}")]
  UnknownAdventure(String),
  #[error("adventure has no scene at index {0}")]
  UnknownScene(usize),
  #[error("unknown game: {0}")]
  UnknownGame(String),
  #[error(transparent)]
  Game(#[from] GameError),
}

impl QuestError {
  /// Message safe to show the player. Generation errors share one message.
  pub fn user_message(&self) -> String {
    match self {
      QuestError::ModelUnavailable(_)
      | QuestError::GenerationFailed(_)
      | QuestError::MalformedGenerationResult(_) => GENERATION_MESSAGE.to_string(),
      QuestError::ContentExtractionFailed(_) => EXTRACTION_MESSAGE.to_string(),
      QuestError::NoAdventure => "Could not find the generated adventure. Please try creating one again!".to_string(),
      other => other.to_string(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      QuestError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      QuestError::GenerationFailed(_) | QuestError::MalformedGenerationResult(_) => StatusCode::BAD_GATEWAY,
      QuestError::ContentExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
      QuestError::NoAdventure
      | QuestError::UnknownAdventure(_)
      | QuestError::UnknownScene(_)
      | QuestError::UnknownGame(_) => StatusCode::NOT_FOUND,
      QuestError::Game(GameError::UnknownHotspot(_)) => StatusCode::NOT_FOUND,
      QuestError::Game(GameError::GameOver(_)) => StatusCode::CONFLICT,
      QuestError::Game(GameError::NoValidHotspot) => StatusCode::UNPROCESSABLE_ENTITY,
    }
  }
}

impl IntoResponse for QuestError {
  fn into_response(self) -> axum::response::Response {
    (self.status(), Json(json!({ "message": self.user_message() }))).into_response()
  }
}
