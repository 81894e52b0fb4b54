//! Application state: model handle, latest adventure, live games.
//!
//! This module owns:
//!   - the language model capability (Ollama by default, any `LanguageModel` in tests)
//!   - the prompt settings (from TOML or defaults)
//!   - the most recent adventure, as read by the results surface
//!   - game sessions by id, bounded and pruned when the latest adventure changes
//!   - a gate that keeps the single local model to one generation at a time

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::StoredAdventure;
use crate::game::GameState;
use crate::generation::PromptSettings;
use crate::model::{Availability, LanguageModel};
use crate::ollama::Ollama;

/// Most games kept at once; the oldest is evicted first.
pub const MAX_LIVE_GAMES: usize = 64;

/// A game plus the adventure it was started from.
pub struct LiveGame {
    pub adventure_id: String,
    pub game: GameState,
}

/// Live games by id, in start order, never more than `capacity`.
pub struct GameStore {
    games: HashMap<String, LiveGame>,
    order: VecDeque<String>,
    capacity: usize,
}

impl GameStore {
    pub fn new(capacity: usize) -> Self {
        Self { games: HashMap::new(), order: VecDeque::new(), capacity: capacity.max(1) }
    }

    pub fn insert(&mut self, id: String, entry: LiveGame) {
        self.order.push_back(id.clone());
        self.games.insert(id, entry);
        while self.games.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            if self.games.remove(&oldest).is_some() {
                debug!(target: "game", game_id = %oldest, "Evicted oldest game");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&LiveGame> {
        self.games.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut LiveGame> {
        self.games.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Drop every game not started from `adventure_id`. Returns how many went.
    pub fn retain_adventure(&mut self, adventure_id: &str) -> usize {
        let before = self.games.len();
        self.games.retain(|_, g| g.adventure_id == adventure_id);
        self.order.retain(|id| self.games.contains_key(id));
        before - self.games.len()
    }
}

pub struct AppState {
    pub model: Arc<dyn LanguageModel>,
    pub prompt: PromptSettings,
    pub latest: RwLock<Option<StoredAdventure>>,
    pub games: RwLock<GameStore>,
    pub generation_gate: Mutex<()>,
}

impl AppState {
    /// Build state from config, backed by the configured Ollama daemon.
    #[instrument(level = "info", skip_all)]
    pub fn new(cfg: &AppConfig) -> Result<Self, String> {
        let ollama = Ollama::from_config(&cfg.model).map_err(|e| {
            error!(target: "doodle_quest", error = %e, "Failed to build model client");
            e
        })?;
        info!(target: "doodle_quest", base_url = %ollama.base_url, model = %ollama.model, "Ollama model configured");
        Ok(Self::with_model(Arc::new(ollama), cfg.prompt.settings()))
    }

    pub fn with_model(model: Arc<dyn LanguageModel>, prompt: PromptSettings) -> Self {
        Self {
            model,
            prompt,
            latest: RwLock::new(None),
            games: RwLock::new(GameStore::new(MAX_LIVE_GAMES)),
            generation_gate: Mutex::new(()),
        }
    }

    /// Startup probe; only logs. Generation re-checks on every request.
    pub async fn log_model_availability(&self) {
        match self.model.availability().await {
            Ok(Availability::Unavailable) | Err(_) => {
                warn!(target: "doodle_quest", "Model currently unavailable; generation requests will fail until it is reachable")
            }
            Ok(a) => info!(target: "doodle_quest", availability = ?a, "Model capability detected"),
        }
    }

    /// Replace the latest adventure. Games from the previous one are dropped.
    #[instrument(level = "debug", skip(self, adventure), fields(id = %adventure.id, scenes = adventure.scenes.len()))]
    pub async fn store_latest(&self, adventure: StoredAdventure) {
        let id = adventure.id.clone();
        *self.latest.write().await = Some(adventure);
        let mut games = self.games.write().await;
        let pruned = games.retain_adventure(&id);
        if pruned > 0 {
            debug!(target: "game", pruned, remaining = games.len(), "Dropped games from the previous adventure");
        }
    }

    pub async fn latest(&self) -> Option<StoredAdventure> {
        self.latest.read().await.clone()
    }
}
