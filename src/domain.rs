//! Domain models: the generated scene, its hotspots, and the stored adventure.

use serde::{Deserialize, Serialize};

use crate::catalog::{Difficulty, Language};

/// One selectable item in a scene. `is_valid = false` marks a distractor.
///
/// Every field is required when decoding model output: a hotspot missing any of
/// them makes the whole result malformed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
  pub hotspot_doodle_svg: String,
  pub pop_up_text: String,
  pub description: String,
  #[serde(rename = "isValid")]
  pub is_valid: bool,
}

/// A full generated adventure unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
  pub theme: String,
  pub summary: String,
  pub main_doodle_svg: String,
  pub doodle_description: String,
  pub hotspots: Vec<Hotspot>,
}

impl Scene {
  pub fn valid_count(&self) -> usize {
    self.hotspots.iter().filter(|h| h.is_valid).count()
  }

  pub fn invalid_count(&self) -> usize {
    self.hotspots.len() - self.valid_count()
  }
}

/// Latest generation result, kept for the results surface together with the
/// options that produced it.
#[derive(Clone, Debug, Serialize)]
pub struct StoredAdventure {
  pub id: String,
  pub scenes: Vec<Scene>,
  pub difficulty: Difficulty,
  pub language: Language,
}
