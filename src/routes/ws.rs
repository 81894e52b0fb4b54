//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. Generation streams `model_status` progress messages
//! and then exactly one terminal reply; everything else gets a single reply.
//!
//! Messages are handled one at a time, so a connection never has two
//! generations in flight.

use std::sync::Arc;
use async_trait::async_trait;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug, warn};

use crate::error::QuestError;
use crate::logic::*;
use crate::model::ProgressReporter;
use crate::protocol::{ClientWsMessage, GenerateIn, ModelStatus, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "doodle_quest", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "doodle_quest", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(ClientWsMessage::GenerateAdventure(input)) => {
            match run_generation(&mut socket, &state, input).await {
              Some(reply) => reply,
              None => break,
            }
          }
          Ok(incoming) => {
            debug!(target: "doodle_quest", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid message: {}", e) },
        };

        if !send(&mut socket, &reply_msg).await {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "doodle_quest", "WebSocket disconnected");
}

/// Where server messages go. A WebSocket in production.
#[async_trait]
trait Outbox: Send {
  /// Deliver one message; false if the peer is gone.
  async fn push(&mut self, msg: &ServerWsMessage) -> bool;
}

#[async_trait]
impl Outbox for WebSocket {
  async fn push(&mut self, msg: &ServerWsMessage) -> bool {
    let out = serde_json::to_string(msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    if let Err(e) = self.send(Message::Text(out)).await {
      error!(target: "doodle_quest", error = %e, "WS send error");
      return false;
    }
    true
  }
}

async fn send<O: Outbox>(out: &mut O, msg: &ServerWsMessage) -> bool {
  out.push(msg).await
}

fn downloading(progress: u8) -> ServerWsMessage {
  ServerWsMessage::ModelStatus { status: ModelStatus::Downloading, progress: Some(progress) }
}

/// Drive one generation while forwarding download progress. Returns the terminal
/// reply, or None if the client went away.
#[instrument(level = "info", skip_all, fields(difficulty = input.difficulty.code(), language = input.language.code()))]
async fn run_generation<O: Outbox>(socket: &mut O, state: &AppState, input: GenerateIn) -> Option<ServerWsMessage> {
  if !send(socket, &ServerWsMessage::ModelStatus { status: ModelStatus::Generating, progress: None }).await {
    return None;
  }

  let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
  let generation = generate_adventure(state, input, ProgressReporter::new(tx));
  tokio::pin!(generation);

  let result = loop {
    tokio::select! {
      biased;
      Some(p) = rx.recv() => {
        if !send(socket, &downloading(p)).await {
          // Dropping the generation future releases the session.
          warn!(target: "generation", "Client disconnected during generation");
          return None;
        }
      }
      res = &mut generation => break res,
    }
  };
  while let Ok(p) = rx.try_recv() {
    if !send(socket, &downloading(p)).await {
      return None;
    }
  }

  Some(match result {
    Ok(adventure) => {
      info!(target: "generation", id = %adventure.id, "WS adventure ready");
      ServerWsMessage::Adventure { adventure }
    }
    Err(e) => {
      error!(target: "generation", error = %e, "WS generation failed");
      ServerWsMessage::Error { message: e.user_message() }
    }
  })
}

fn reply<T>(res: Result<T, QuestError>, ok: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match res {
    Ok(v) => ok(v),
    Err(e) => {
      warn!(target: "game", error = %e, "WS request failed");
      ServerWsMessage::Error { message: e.user_message() }
    }
  }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartGame(input) => {
      reply(start_game(state, input).await, |game| ServerWsMessage::Game { game })
    }

    ClientWsMessage::SelectHotspot(input) => {
      reply(select_hotspot(state, input).await, |game| ServerWsMessage::Game { game })
    }

    ClientWsMessage::ViewHotspot(input) => {
      reply(view_hotspot(state, input).await, ServerWsMessage::HotspotDetail)
    }

    ClientWsMessage::Replay(input) => {
      reply(replay(state, input).await, |game| ServerWsMessage::Game { game })
    }

    ClientWsMessage::GenerateAdventure(_) =>
      ServerWsMessage::Error { message: "generate_adventure is handled by the connection loop".into() },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Value};

  use crate::catalog::{Difficulty, Language};
  use crate::generation::PromptSettings;
  use crate::model::{fake::FakeModel, Availability};
  use crate::prompt::GOLDEN_EXAMPLE;

  /// Records every message; refuses after `accept` of them.
  struct Recorder {
    sent: Vec<Value>,
    accept: usize,
  }

  impl Recorder {
    fn open() -> Self { Self { sent: Vec::new(), accept: usize::MAX } }
  }

  #[async_trait]
  impl Outbox for Recorder {
    async fn push(&mut self, msg: &ServerWsMessage) -> bool {
      if self.sent.len() >= self.accept {
        return false;
      }
      self.sent.push(serde_json::to_value(msg).unwrap());
      true
    }
  }

  fn input() -> GenerateIn {
    GenerateIn { text: "Wash your hands.".into(), image_data_url: None, difficulty: Difficulty::Easy, language: Language::En }
  }

  fn downloading_model() -> FakeModel {
    let mut model = FakeModel::responding(GOLDEN_EXAMPLE);
    model.availability = Availability::Downloadable;
    model.download_steps = vec![0, 30, 20, 70, 70, 100];
    model
  }

  #[tokio::test]
  async fn generation_streams_status_then_one_adventure() {
    let state = AppState::with_model(Arc::new(downloading_model()), PromptSettings::default());
    let mut out = Recorder::open();
    let terminal = run_generation(&mut out, &state, input()).await.unwrap();

    assert_eq!(out.sent[0], json!({ "type": "model_status", "status": "generating" }));
    let progress: Vec<u64> = out.sent[1..]
      .iter()
      .map(|m| {
        assert_eq!(m["status"], "downloading");
        m["progress"].as_u64().unwrap()
      })
      .collect();
    assert_eq!(progress, vec![0, 30, 70, 100]);

    let terminal = serde_json::to_value(&terminal).unwrap();
    assert_eq!(terminal["type"], "adventure");
    assert_eq!(terminal["adventure"]["id"], state.latest().await.unwrap().id.as_str());
  }

  #[tokio::test]
  async fn failed_generation_ends_with_one_error() {
    let mut model = downloading_model();
    model.fail_create = true;
    let state = AppState::with_model(Arc::new(model), PromptSettings::default());
    let mut out = Recorder::open();
    let terminal = serde_json::to_value(run_generation(&mut out, &state, input()).await.unwrap()).unwrap();

    assert_eq!(terminal, json!({ "type": "error", "message": "The AI had trouble drawing the adventure. Please try again!" }));
    assert!(out.sent.iter().all(|m| m["type"] == "model_status"));
    assert!(state.latest().await.is_none());
  }

  #[tokio::test]
  async fn disconnect_mid_generation_releases_the_session() {
    let mut model = downloading_model();
    model.hang_prompt = true;
    let counters = model.counters.clone();
    let state = AppState::with_model(Arc::new(model), PromptSettings::default());
    let mut out = Recorder { sent: Vec::new(), accept: 1 };

    assert!(run_generation(&mut out, &state, input()).await.is_none());
    assert_eq!(out.sent.len(), 1);
    assert_eq!(counters.created.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(counters.destroyed.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(state.latest().await.is_none());
  }
}
