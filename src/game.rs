//! Hotspot game state machine.
//!
//! A game shuffles a scene's hotspots and tracks which valid ones the player has
//! found. One invalid pick loses; finding every valid label wins. `Won` and
//! `Lost` are terminal until the game is replayed. A scene without a single
//! valid hotspot cannot be played and is refused on load.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::domain::{Hotspot, Scene};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Playing,
  Won,
  Lost,
}

impl Phase {
  pub fn is_terminal(self) -> bool {
    !matches!(self, Phase::Playing)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
  #[error("no hotspot at position {0}")]
  UnknownHotspot(usize),
  #[error("the game is already over ({0:?}); replay to play again")]
  GameOver(Phase),
  #[error("this scene has no correct hotspot to find; please create a new adventure")]
  NoValidHotspot,
}

#[derive(Clone, Debug)]
pub struct GameState {
  scene: Scene,
  order: Vec<Hotspot>,
  correctly_selected: HashSet<String>,
  valid_total: usize,
  wrong_pick: Option<usize>,
  phase: Phase,
}

impl GameState {
  pub fn new<R: Rng + ?Sized>(scene: Scene, rng: &mut R) -> Result<Self, GameError> {
    ensure_playable(&scene)?;
    let mut game = Self {
      scene,
      order: Vec::new(),
      correctly_selected: HashSet::new(),
      valid_total: 0,
      wrong_pick: None,
      phase: Phase::Playing,
    };
    game.reset(rng);
    Ok(game)
  }

  /// Start over on the same scene with a fresh shuffle.
  pub fn replay<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.reset(rng);
  }

  /// Start over on another scene, e.g. a freshly generated one. An unplayable
  /// scene leaves the current game untouched.
  pub fn replay_with<R: Rng + ?Sized>(&mut self, scene: Scene, rng: &mut R) -> Result<(), GameError> {
    ensure_playable(&scene)?;
    self.scene = scene;
    self.reset(rng);
    Ok(())
  }

  fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.order = self.scene.hotspots.clone();
    self.order.shuffle(rng);
    // Labels are the selection key; duplicates count once.
    self.valid_total = self
      .scene
      .hotspots
      .iter()
      .filter(|h| h.is_valid)
      .map(|h| h.pop_up_text.as_str())
      .collect::<HashSet<_>>()
      .len();
    self.correctly_selected.clear();
    self.wrong_pick = None;
    self.phase = Phase::Playing;
  }

  /// Pick the hotspot displayed at `position`.
  pub fn select(&mut self, position: usize) -> Result<Phase, GameError> {
    if self.phase.is_terminal() {
      return Err(GameError::GameOver(self.phase));
    }
    let hotspot = self.order.get(position).ok_or(GameError::UnknownHotspot(position))?;

    if !hotspot.is_valid {
      self.wrong_pick = Some(position);
      self.phase = Phase::Lost;
      return Ok(self.phase);
    }

    self.correctly_selected.insert(hotspot.pop_up_text.clone());
    if self.correctly_selected.len() == self.valid_total {
      self.phase = Phase::Won;
    }
    Ok(self.phase)
  }

  /// Look at a hotspot's description. Never changes the game.
  pub fn view(&self, position: usize) -> Result<&Hotspot, GameError> {
    self.order.get(position).ok_or(GameError::UnknownHotspot(position))
  }

  pub fn scene(&self) -> &Scene { &self.scene }
  pub fn order(&self) -> &[Hotspot] { &self.order }
  pub fn phase(&self) -> Phase { self.phase }
  pub fn valid_total(&self) -> usize { self.valid_total }
  pub fn wrong_pick(&self) -> Option<usize> { self.wrong_pick }
  pub fn correct_count(&self) -> usize { self.correctly_selected.len() }

  pub fn is_selected(&self, position: usize) -> bool {
    match self.order.get(position) {
      Some(h) if h.is_valid => self.correctly_selected.contains(&h.pop_up_text),
      Some(_) => self.wrong_pick == Some(position),
      None => false,
    }
  }
}

fn ensure_playable(scene: &Scene) -> Result<(), GameError> {
  if scene.valid_count() == 0 {
    return Err(GameError::NoValidHotspot);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn hotspot(label: &str, is_valid: bool) -> Hotspot {
    Hotspot {
      hotspot_doodle_svg: "<svg/>".into(),
      pop_up_text: label.into(),
      description: format!("about {}", label),
      is_valid,
    }
  }

  /// The easy-difficulty shape: 3 valid, 2 distractors.
  fn easy_scene() -> Scene {
    Scene {
      theme: "Germ Adventure".into(),
      summary: "Fight germs".into(),
      main_doodle_svg: "<svg/>".into(),
      doodle_description: "Lili and soap".into(),
      hotspots: vec![
        hotspot("Soap", true),
        hotspot("Pizza", false),
        hotspot("Water", true),
        hotspot("Clean Hands", true),
        hotspot("Video Games", false),
      ],
    }
  }

  fn positions(game: &GameState, valid: bool) -> Vec<usize> {
    game.order().iter().enumerate().filter(|(_, h)| h.is_valid == valid).map(|(i, _)| i).collect()
  }

  fn sorted_labels(hotspots: &[Hotspot]) -> Vec<String> {
    let mut v: Vec<String> = hotspots.iter().map(|h| h.pop_up_text.clone()).collect();
    v.sort();
    v
  }

  #[test]
  fn selecting_all_valid_wins_only_on_last() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let valid = positions(&game, true);
    assert_eq!(valid.len(), 3);
    assert_eq!(game.select(valid[0]), Ok(Phase::Playing));
    assert_eq!(game.select(valid[1]), Ok(Phase::Playing));
    assert_eq!(game.select(valid[2]), Ok(Phase::Won));
    assert_eq!(game.correct_count(), 3);
  }

  #[test]
  fn any_order_of_valid_picks_wins() {
    for seed in 0..20 {
      let mut rng = StdRng::seed_from_u64(seed);
      let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
      let mut valid = positions(&game, true);
      valid.shuffle(&mut rng);
      let mut phase = Phase::Playing;
      for p in valid {
        assert_eq!(phase, Phase::Playing);
        phase = game.select(p).unwrap();
      }
      assert_eq!(phase, Phase::Won);
    }
  }

  #[test]
  fn first_invalid_pick_loses_with_no_credit() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let invalid = positions(&game, false)[0];
    assert_eq!(game.select(invalid), Ok(Phase::Lost));
    assert_eq!(game.correct_count(), 0);
    assert_eq!(game.wrong_pick(), Some(invalid));
  }

  #[test]
  fn invalid_pick_after_progress_still_loses() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let valid = positions(&game, true);
    game.select(valid[0]).unwrap();
    game.select(valid[1]).unwrap();
    assert_eq!(game.select(positions(&game, false)[1]), Ok(Phase::Lost));
  }

  #[test]
  fn repeated_valid_pick_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let valid = positions(&game, true);
    game.select(valid[0]).unwrap();
    assert_eq!(game.select(valid[0]), Ok(Phase::Playing));
    assert_eq!(game.select(valid[0]), Ok(Phase::Playing));
    assert_eq!(game.correct_count(), 1);
    game.select(valid[1]).unwrap();
    assert_eq!(game.phase(), Phase::Playing);
  }

  #[test]
  fn terminal_phases_reject_further_picks() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    for p in positions(&game, true) {
      game.select(p).unwrap();
    }
    let invalid = positions(&game, false)[0];
    assert_eq!(game.select(invalid), Err(GameError::GameOver(Phase::Won)));
    assert_eq!(game.phase(), Phase::Won);

    game.replay(&mut rng);
    game.select(positions(&game, false)[0]).unwrap();
    let valid = positions(&game, true)[0];
    assert_eq!(game.select(valid), Err(GameError::GameOver(Phase::Lost)));
    assert_eq!(game.correct_count(), 0);
  }

  #[test]
  fn viewing_never_transitions() {
    let mut rng = StdRng::seed_from_u64(5);
    let game = GameState::new(easy_scene(), &mut rng).unwrap();
    for p in 0..game.order().len() {
      let h = game.view(p).unwrap();
      assert!(h.description.starts_with("about "));
    }
    assert_eq!(game.phase(), Phase::Playing);
    assert_eq!(game.view(99), Err(GameError::UnknownHotspot(99)));
  }

  #[test]
  fn out_of_range_selection_is_an_error() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    assert_eq!(game.select(5), Err(GameError::UnknownHotspot(5)));
    assert_eq!(game.phase(), Phase::Playing);
  }

  #[test]
  fn replay_resets_and_keeps_the_same_hotspots() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let before = sorted_labels(game.order());
    game.select(positions(&game, false)[0]).unwrap();

    let mut orders = HashSet::new();
    for _ in 0..20 {
      game.replay(&mut rng);
      assert_eq!(game.phase(), Phase::Playing);
      assert_eq!(game.correct_count(), 0);
      assert_eq!(game.wrong_pick(), None);
      assert_eq!(sorted_labels(game.order()), before);
      orders.insert(game.order().iter().map(|h| h.pop_up_text.clone()).collect::<Vec<_>>());
    }
    assert!(orders.len() > 1, "replays should reshuffle");
  }

  #[test]
  fn replay_with_swaps_scene() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let mut next = easy_scene();
    next.theme = "Second".into();
    next.hotspots.truncate(2);
    game.replay_with(next, &mut rng).unwrap();
    assert_eq!(game.scene().theme, "Second");
    assert_eq!(game.order().len(), 2);
    assert_eq!(game.valid_total(), 1);
  }

  #[test]
  fn duplicate_valid_labels_count_once() {
    let mut scene = easy_scene();
    scene.hotspots.push(hotspot("Soap", true));
    let mut rng = StdRng::seed_from_u64(10);
    let mut game = GameState::new(scene, &mut rng).unwrap();
    assert_eq!(game.valid_total(), 3);
    let soaps: Vec<usize> = game.order().iter().enumerate().filter(|(_, h)| h.pop_up_text == "Soap").map(|(i, _)| i).collect();
    game.select(soaps[0]).unwrap();
    assert!(game.is_selected(soaps[1]));
    for p in positions(&game, true) {
      game.select(p).unwrap_or(Phase::Won);
    }
    assert_eq!(game.phase(), Phase::Won);
  }

  #[test]
  fn scene_without_valid_hotspots_is_refused() {
    let mut scene = easy_scene();
    scene.hotspots.retain(|h| !h.is_valid);
    let mut rng = StdRng::seed_from_u64(11);
    assert_eq!(GameState::new(scene.clone(), &mut rng).unwrap_err(), GameError::NoValidHotspot);

    let mut game = GameState::new(easy_scene(), &mut rng).unwrap();
    let first = positions(&game, true)[0];
    game.select(first).unwrap();
    assert_eq!(game.replay_with(scene, &mut rng), Err(GameError::NoValidHotspot));
    assert_eq!(game.scene().theme, "Germ Adventure");
    assert_eq!(game.correct_count(), 1);
    assert_eq!(game.phase(), Phase::Playing);
  }
}
