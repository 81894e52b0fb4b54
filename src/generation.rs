//! Generation client: one schema-constrained request to the model.
//!
//! Lifecycle: availability check → session creation (with download progress) →
//! prompt → parse/validate → release. The session is released on every exit,
//! including when the returned future is dropped mid-flight.

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{Difficulty, Language};
use crate::domain::Scene;
use crate::error::QuestError;
use crate::model::{Availability, ImageInput, LanguageModel, Modality, ModelSession, ProgressReporter, PromptInput, SessionOptions};
use crate::prompt::{build_prompt_with, output_schema, DEFAULT_TEMPLATE, MAX_PAGE_CHARS};
use crate::util::trunc_for_log;

/// One user action's worth of input. Consumed by [`generate`].
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub page_text: String,
  pub image: Option<ImageInput>,
  pub difficulty: Difficulty,
  pub language: Language,
}

/// Prompt template and page bound, usually from configuration.
#[derive(Clone, Debug)]
pub struct PromptSettings {
  pub template: String,
  pub max_page_chars: usize,
}

impl Default for PromptSettings {
  fn default() -> Self {
    Self { template: DEFAULT_TEMPLATE.to_string(), max_page_chars: MAX_PAGE_CHARS }
  }
}

/// Destroys the wrapped session when dropped.
struct SessionGuard(Box<dyn ModelSession>);

impl Drop for SessionGuard {
  fn drop(&mut self) {
    self.0.destroy();
    debug!(target: "generation", "Model session destroyed");
  }
}

/// Run a single generation attempt. No retry: callers re-invoke on failure.
#[instrument(
  level = "info",
  target = "generation",
  skip(model, request, progress, settings),
  fields(difficulty = request.difficulty.code(), language = request.language.code(), page_len = request.page_text.len(), has_image = request.image.is_some())
)]
pub async fn generate(
  model: &dyn LanguageModel,
  request: GenerationRequest,
  progress: ProgressReporter,
  settings: &PromptSettings,
) -> Result<Vec<Scene>, QuestError> {
  let availability = model.availability().await.map_err(|e| {
    error!(target: "generation", error = %e, "Availability check failed");
    QuestError::ModelUnavailable(e)
  })?;
  if availability == Availability::Unavailable {
    warn!(target: "generation", "Model reports unavailable");
    return Err(QuestError::ModelUnavailable("model reports unavailable".into()));
  }
  info!(target: "generation", ?availability, "Model capability present");

  let mut expected_inputs = vec![Modality::Text];
  if request.image.is_some() {
    expected_inputs.push(Modality::Image);
  }
  let options = SessionOptions { expected_inputs, output_language: request.language };

  let start = Instant::now();
  let session = model.create(options, &progress).await.map_err(|e| {
    error!(target: "generation", error = %e, "Session creation failed");
    QuestError::GenerationFailed(e)
  })?;
  let mut session = SessionGuard(session);
  info!(target: "generation", elapsed = ?start.elapsed(), "Model session ready");

  let text = build_prompt_with(
    &settings.template,
    settings.max_page_chars,
    &request.page_text,
    request.difficulty,
    request.language,
  );
  let schema = output_schema();
  let input = PromptInput { text, image: request.image };

  let start = Instant::now();
  let raw = session.0.prompt(input, &schema).await.map_err(|e| {
    error!(target: "generation", error = %e, elapsed = ?start.elapsed(), "Prompt failed");
    QuestError::GenerationFailed(e)
  })?;
  info!(target: "generation", elapsed = ?start.elapsed(), response_len = raw.len(), "Model response received");

  let scenes = parse_scenes(&raw).map_err(|e| {
    warn!(target: "generation", error = %e, response = %trunc_for_log(&raw, 200), "Rejected malformed model output");
    e
  })?;
  drop(session);

  for (i, scene) in scenes.iter().enumerate() {
    let (valid, invalid) = (scene.valid_count(), scene.invalid_count());
    if valid == 0 || invalid == 0 {
      warn!(target: "generation", scene = i, valid, invalid, "Scene lacks a valid or an invalid hotspot; accepting as generated");
    }
    if valid + invalid != request.difficulty.hotspot_count() || invalid != request.difficulty.distractor_count() {
      debug!(target: "generation", scene = i, valid, invalid, "Model did not match requested hotspot counts");
    }
  }
  Ok(scenes)
}

/// Decode the model's answer. Rejects instead of repairing.
pub fn parse_scenes(raw: &str) -> Result<Vec<Scene>, QuestError> {
  let scenes: Vec<Scene> = serde_json::from_str(raw.trim())
    .map_err(|e| QuestError::MalformedGenerationResult(e.to_string()))?;
  if scenes.is_empty() {
    return Err(QuestError::MalformedGenerationResult("empty scene array".into()));
  }
  if let Some(i) = scenes.iter().position(|s| s.hotspots.is_empty()) {
    return Err(QuestError::MalformedGenerationResult(format!("scene {} has no hotspots", i)));
  }
  Ok(scenes)
}
