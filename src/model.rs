//! Contract with the on-device language model.
//!
//! The capability (`LanguageModel`) is passed explicitly to the generation client;
//! each request creates one `ModelSession`, prompts it once and destroys it.
//! Download progress flows through a `ProgressReporter`.

use std::sync::{
  atomic::{AtomicI16, Ordering},
  Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::catalog::Language;

/// What the capability reports before a session is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
  /// Weights are local; session creation is quick.
  Available,
  /// Usable, but creating a session first downloads the model.
  Downloadable,
  Unavailable,
}

/// Input modality a session must accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
  Text,
  Image,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
  pub expected_inputs: Vec<Modality>,
  pub output_language: Language,
}

/// Decoded image attached to a prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInput {
  pub mime: String,
  pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct PromptInput {
  pub text: String,
  pub image: Option<ImageInput>,
}

/// The capability itself: availability probe and session factory.
#[async_trait]
pub trait LanguageModel: Send + Sync {
  async fn availability(&self) -> Result<Availability, String>;

  /// Create a session. May block for a long time while the model downloads;
  /// download percentages go to `progress`.
  async fn create(
    &self,
    options: SessionOptions,
    progress: &ProgressReporter,
  ) -> Result<Box<dyn ModelSession>, String>;
}

/// One exclusive model session. `prompt` borrows mutably, so a session never
/// has two prompts outstanding.
#[async_trait]
pub trait ModelSession: Send {
  /// Submit `input` with `constraint` as a JSON Schema on the response text.
  async fn prompt(&mut self, input: PromptInput, constraint: &Value) -> Result<String, String>;

  /// Release the session. Called exactly once, on every exit path.
  fn destroy(&mut self);
}

/// Push channel for download progress (0..=100).
///
/// Emitted values are non-decreasing: regressions and repeats are dropped and
/// anything above 100 is clamped. A reporter without a channel discards
/// everything, so ignoring progress never affects the result.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
  tx: Option<mpsc::UnboundedSender<u8>>,
  last: Arc<AtomicI16>,
}

impl ProgressReporter {
  pub fn new(tx: mpsc::UnboundedSender<u8>) -> Self {
    Self { tx: Some(tx), last: Arc::new(AtomicI16::new(-1)) }
  }

  pub fn noop() -> Self {
    Self { tx: None, last: Arc::new(AtomicI16::new(-1)) }
  }

  /// Report a percentage. Returns true if it was forwarded.
  pub fn report(&self, percent: u8) -> bool {
    let p = percent.min(100) as i16;
    let prev = self.last.fetch_max(p, Ordering::SeqCst);
    if p <= prev {
      return false;
    }
    match &self.tx {
      // A dropped receiver only means nobody is listening anymore.
      Some(tx) => tx.send(p as u8).is_ok(),
      None => false,
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reporter_drops_regressions_and_clamps() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let r = ProgressReporter::new(tx);
    for p in [0, 10, 10, 5, 40, 39, 250, 100] {
      r.report(p);
    }
    drop(r);
    let mut seen = Vec::new();
    while let Ok(p) = rx.try_recv() {
      seen.push(p);
    }
    assert_eq!(seen, vec![0, 10, 40, 100]);
  }

  #[test]
  fn noop_reporter_never_sends() {
    let r = ProgressReporter::noop();
    assert!(!r.report(30));
    assert!(!r.report(100));
  }

  #[test]
  fn clones_share_ordering() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let a = ProgressReporter::new(tx);
    let b = a.clone();
    assert!(a.report(50));
    assert!(!b.report(20));
    assert_eq!(rx.try_recv().ok(), Some(50));
    assert!(rx.try_recv().is_err());
  }
}
