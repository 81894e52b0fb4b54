//! Static catalogs that drive prompt generation: difficulty levels and output languages.
//!
//! Both are closed enums serialized by their short code ("easy", "ja", ...), so an
//! unknown code is rejected by serde at the message boundary.

use serde::{Deserialize, Serialize};

/// How hard the generated quest should be. Selects audience and hotspot counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Intermediate,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 4] = [
    Difficulty::Easy,
    Difficulty::Medium,
    Difficulty::Intermediate,
    Difficulty::Hard,
  ];

  pub fn code(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Hard => "hard",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Intermediate => "Intermediate",
      Difficulty::Hard => "Hard",
    }
  }

  /// Audience age range, used as tone guidance in the prompt.
  pub fn age_range(self) -> &'static str {
    match self {
      Difficulty::Easy => "5 to 10",
      Difficulty::Medium => "11 to 19",
      Difficulty::Intermediate => "20 to 29",
      Difficulty::Hard => "30+",
    }
  }

  /// Total number of hotspots requested from the model.
  pub fn hotspot_count(self) -> usize {
    match self {
      Difficulty::Easy => 5,
      Difficulty::Medium => 9,
      Difficulty::Intermediate => 15,
      Difficulty::Hard => 20,
    }
  }

  /// How many of the requested hotspots must be invalid distractors.
  pub fn distractor_count(self) -> usize {
    match self {
      Difficulty::Easy => 2,
      Difficulty::Medium => 4,
      Difficulty::Intermediate => 7,
      Difficulty::Hard => 10,
    }
  }
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Easy }
}

/// Output language of the generated scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
  En,
  Es,
  Ja,
}

impl Language {
  pub const ALL: [Language; 3] = [Language::En, Language::Es, Language::Ja];

  pub fn code(self) -> &'static str {
    match self {
      Language::En => "en",
      Language::Es => "es",
      Language::Ja => "ja",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Language::En => "English",
      Language::Es => "Spanish",
      Language::Ja => "Japanese",
    }
  }
}

impl Default for Language {
  fn default() -> Self { Language::En }
}
