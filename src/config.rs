//! Loading service configuration (model backend + prompt overrides) from TOML.
//!
//! Resolution order: built-in defaults, then the TOML file at QUEST_CONFIG_PATH,
//! then environment overrides (OLLAMA_BASE_URL, QUEST_MODEL).

use serde::Deserialize;
use tracing::{error, info};

use crate::generation::PromptSettings;
use crate::prompt::{missing_placeholders, DEFAULT_TEMPLATE, MAX_PAGE_CHARS};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub model: ModelConfig,
  #[serde(default)]
  pub prompt: PromptConfig,
}

/// Local Ollama daemon used as the on-device model.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  /// Upper bound for one prompt call. Model downloads are not bounded.
  pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      base_url: "http://127.0.0.1:11434".into(),
      model: "gemma3:1b".into(),
      temperature: 0.8,
      request_timeout_secs: 300,
    }
  }
}

/// Prompt template override. Unset fields keep the built-in values.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)] pub template: Option<String>,
  #[serde(default)] pub max_page_chars: Option<usize>,
}

impl PromptConfig {
  /// Effective prompt settings. A template override missing a required
  /// placeholder is logged and replaced by the built-in template.
  pub fn settings(&self) -> PromptSettings {
    let template = match &self.template {
      Some(t) => {
        let missing = missing_placeholders(t);
        if missing.is_empty() {
          t.clone()
        } else {
          error!(target: "doodle_quest", ?missing, "Prompt template override lacks required placeholders; using the built-in template");
          DEFAULT_TEMPLATE.to_string()
        }
      }
      None => DEFAULT_TEMPLATE.to_string(),
    };
    PromptSettings { template, max_page_chars: self.max_page_chars.unwrap_or(MAX_PAGE_CHARS) }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file at {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to parse config file at {path}: {source}")]
  Parse { path: String, source: toml::de::Error },
}

pub fn load_from_path(path: &str) -> Result<AppConfig, ConfigError> {
  let s = std::fs::read_to_string(path)
    .map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
  toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

/// Build the effective config from QUEST_CONFIG_PATH and env overrides.
/// A missing or broken file is logged and replaced by defaults.
pub fn load_from_env() -> AppConfig {
  let mut cfg = match std::env::var("QUEST_CONFIG_PATH") {
    Ok(path) => match load_from_path(&path) {
      Ok(cfg) => {
        info!(target: "doodle_quest", %path, "Loaded config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "doodle_quest", error = %e, "Using default config");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
    cfg.model.base_url = url;
  }
  if let Ok(model) = std::env::var("QUEST_MODEL") {
    cfg.model.model = model;
  }
  cfg
}
