//! On-device model backed by a local Ollama daemon.
//!
//! - availability: `GET /api/tags` (is the model already pulled?)
//! - session creation: `POST /api/pull` streamed as NDJSON, turned into download percentages
//! - prompt: `POST /api/chat` with `format` set to the JSON Schema constraint
//!
//! Calls are instrumented and log model names, latencies and sizes (not contents).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ModelConfig;
use crate::model::{Availability, LanguageModel, Modality, ModelSession, ProgressReporter, PromptInput, SessionOptions};

const UA: &str = "doodle-quest/0.1";

#[derive(Clone)]
pub struct Ollama {
  /// Bounded client for prompt calls.
  client: reqwest::Client,
  /// Unbounded client for pulls, which may run for minutes.
  pull_client: reqwest::Client,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

impl Ollama {
  pub fn from_config(cfg: &ModelConfig) -> Result<Self, String> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.request_timeout_secs))
      .build()
      .map_err(|e| e.to_string())?;
    let pull_client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| e.to_string())?;
    Ok(Self {
      client,
      pull_client,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      temperature: cfg.temperature,
    })
  }

  /// True if `/api/tags` lists our model.
  #[instrument(level = "debug", skip(self), fields(model = %self.model))]
  async fn is_local(&self) -> Result<bool, String> {
    let url = format!("{}/api/tags", self.base_url);
    let res = self.client.get(&url)
      .header(USER_AGENT, UA)
      .send().await.map_err(|e| e.to_string())?;
    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("Ollama HTTP {}: {}", status, extract_ollama_error(&body).unwrap_or(body)));
    }
    let tags: TagsResponse = res.json().await.map_err(|e| e.to_string())?;
    let wanted = canonical_name(&self.model);
    Ok(tags.models.iter().any(|m| canonical_name(&m.name) == wanted))
  }

  /// Pull the model, forwarding progress. Returns once the daemon reports success.
  #[instrument(level = "info", skip(self, progress), fields(model = %self.model))]
  async fn pull(&self, progress: &ProgressReporter) -> Result<(), String> {
    let url = format!("{}/api/pull", self.base_url);
    let req = PullRequest { model: &self.model, stream: true };
    let start = Instant::now();
    let mut res = self.pull_client.post(&url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("Ollama HTTP {}: {}", status, extract_ollama_error(&body).unwrap_or(body)));
    }

    let mut tracker = PullProgress::default();
    let mut buf: Vec<u8> = Vec::new();
    let mut done = false;
    while let Some(chunk) = res.chunk().await.map_err(|e| e.to_string())? {
      buf.extend_from_slice(&chunk);
      while let Some(nl) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=nl).collect();
        done |= handle_pull_line(&line, &mut tracker, progress)?;
      }
    }
    if !buf.is_empty() {
      done |= handle_pull_line(&buf, &mut tracker, progress)?;
    }

    if !done {
      return Err("model pull ended without success".into());
    }
    info!(elapsed = ?start.elapsed(), "Model pull complete");
    Ok(())
  }
}

/// Parse one NDJSON line; returns true on the final success status.
fn handle_pull_line(line: &[u8], tracker: &mut PullProgress, progress: &ProgressReporter) -> Result<bool, String> {
  let text = String::from_utf8_lossy(line);
  let text = text.trim();
  if text.is_empty() {
    return Ok(false);
  }
  let status: PullStatus = serde_json::from_str(text).map_err(|e| format!("bad pull status line: {}", e))?;
  if let Some(err) = status.error {
    return Err(format!("Ollama pull failed: {}", err));
  }
  if let Some(p) = tracker.update(&status) {
    progress.report(p);
  }
  Ok(status.status.as_deref() == Some("success"))
}

#[async_trait]
impl LanguageModel for Ollama {
  #[instrument(level = "info", skip(self), fields(model = %self.model))]
  async fn availability(&self) -> Result<Availability, String> {
    match self.is_local().await {
      Ok(true) => Ok(Availability::Available),
      Ok(false) => Ok(Availability::Downloadable),
      Err(e) => {
        warn!(error = %e, base_url = %self.base_url, "Ollama daemon not reachable");
        Ok(Availability::Unavailable)
      }
    }
  }

  #[instrument(level = "info", skip(self, progress), fields(model = %self.model, inputs = ?options.expected_inputs))]
  async fn create(
    &self,
    options: SessionOptions,
    progress: &ProgressReporter,
  ) -> Result<Box<dyn ModelSession>, String> {
    if !self.is_local().await? {
      info!("Model not present locally; pulling");
      self.pull(progress).await?;
    }
    Ok(Box::new(OllamaSession {
      client: self.client.clone(),
      base_url: self.base_url.clone(),
      model: self.model.clone(),
      temperature: self.temperature,
      accepts_image: options.expected_inputs.contains(&Modality::Image),
      closed: false,
    }))
  }
}

pub struct OllamaSession {
  client: reqwest::Client,
  base_url: String,
  model: String,
  temperature: f32,
  accepts_image: bool,
  closed: bool,
}

#[async_trait]
impl ModelSession for OllamaSession {
  #[instrument(level = "info", skip(self, input, constraint), fields(model = %self.model, prompt_len = input.text.len()))]
  async fn prompt(&mut self, input: PromptInput, constraint: &Value) -> Result<String, String> {
    if self.closed {
      return Err("session already destroyed".into());
    }
    let images = match input.image {
      Some(img) if self.accepts_image => {
        debug!(mime = %img.mime, bytes = img.bytes.len(), "Attaching page image");
        Some(vec![STANDARD.encode(&img.bytes)])
      }
      Some(_) => {
        debug!("Session created without image input; dropping image");
        None
      }
      None => None,
    };
    let req = ChatRequest {
      model: &self.model,
      messages: vec![ChatMessage { role: "user", content: &input.text, images }],
      stream: false,
      format: constraint,
      options: ChatOptions { temperature: self.temperature },
    };

    let url = format!("{}/api/chat", self.base_url);
    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_ollama_error(&body).unwrap_or(body);
      error!(%status, "Ollama chat failed");
      return Err(format!("Ollama HTTP {}: {}", status, msg));
    }

    let body: ChatResponse = res.json().await.map_err(|e| e.to_string())?;
    info!(
      elapsed = ?start.elapsed(),
      prompt_tokens = ?body.prompt_eval_count,
      completion_tokens = ?body.eval_count,
      response_len = body.message.content.len(),
      "Ollama usage"
    );
    Ok(body.message.content)
  }

  fn destroy(&mut self) {
    self.closed = true;
  }
}

/// "llama3.2" and "llama3.2:latest" name the same model.
fn canonical_name(name: &str) -> String {
  if name.contains(':') { name.to_string() } else { format!("{}:latest", name) }
}

/// Aggregates per-layer byte counts from pull status lines into one percentage.
#[derive(Default)]
struct PullProgress {
  layers: HashMap<String, (u64, u64)>,
}

impl PullProgress {
  fn update(&mut self, s: &PullStatus) -> Option<u8> {
    if s.status.as_deref() == Some("success") {
      return Some(100);
    }
    let digest = s.digest.as_ref()?;
    let total = s.total?;
    if total == 0 {
      return None;
    }
    let completed = s.completed.unwrap_or(0).min(total);
    self.layers.insert(digest.clone(), (completed, total));
    let (done, all) = self.layers.values().fold((0u64, 0u64), |(d, a), (c, t)| (d + c, a + t));
    Some(((done * 100) / all) as u8)
  }
}

// --- Ollama DTOs ---

#[derive(Serialize)]
struct PullRequest<'a> { model: &'a str, stream: bool }

#[derive(Deserialize)]
struct PullStatus {
  #[serde(default)] status: Option<String>,
  #[serde(default)] digest: Option<String>,
  #[serde(default)] total: Option<u64>,
  #[serde(default)] completed: Option<u64>,
  #[serde(default)] error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse { #[serde(default)] models: Vec<TagModel> }
#[derive(Deserialize)]
struct TagModel { name: String }

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
  stream: bool,
  format: &'a Value,
  options: ChatOptions,
}
#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  images: Option<Vec<String>>,
}
#[derive(Serialize)]
struct ChatOptions { temperature: f32 }

#[derive(Deserialize)]
struct ChatResponse {
  message: ChatResponseMessage,
  #[serde(default)] prompt_eval_count: Option<u32>,
  #[serde(default)] eval_count: Option<u32>,
}
#[derive(Deserialize)]
struct ChatResponseMessage { #[serde(default)] content: String }

/// Try to extract a clean error message from an Ollama error body.
fn extract_ollama_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}
