//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Every WebSocket message carries a `type` tag with one payload shape per kind;
//! anything else is rejected by serde before reaching core logic.

use serde::{Deserialize, Serialize};

use crate::catalog::{Difficulty, Language};
use crate::domain::StoredAdventure;
use crate::game::{GameState, Phase};

/// Messages the client (popup or results page) can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GenerateAdventure(GenerateIn),
    StartGame(StartGameIn),
    SelectHotspot(HotspotIn),
    ViewHotspot(HotspotIn),
    Replay(ReplayIn),
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    ModelStatus {
        status: ModelStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
    },
    Adventure {
        adventure: StoredAdventure,
    },
    Game {
        game: GameView,
    },
    HotspotDetail(HotspotDetailOut),
    Error {
        message: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Downloading,
    Generating,
}

//
// Request payloads (shared by WS and HTTP)
//

/// Page extraction result plus the options chosen in the popup.
#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub text: String,
    #[serde(rename = "imageDataUrl", default)]
    pub image_data_url: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartGameIn {
    #[serde(rename = "adventureId", default)]
    pub adventure_id: Option<String>,
    #[serde(rename = "sceneIndex", default)]
    pub scene_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct HotspotIn {
    #[serde(rename = "gameId")]
    pub game_id: String,
    pub position: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReplayIn {
    #[serde(rename = "gameId")]
    pub game_id: String,
    /// Replay on the latest stored adventure instead of reshuffling the same scene.
    #[serde(rename = "useLatest", default)]
    pub use_latest: bool,
}

//
// Response payloads
//

/// Player-facing view of a game. Validity stays hidden until a card is picked
/// or the game is over.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: String,
    pub theme: String,
    pub summary: String,
    pub main_doodle_svg: String,
    pub doodle_description: String,
    pub phase: Phase,
    pub correct_count: usize,
    pub valid_total: usize,
    pub cards: Vec<HotspotCard>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotCard {
    pub position: usize,
    pub hotspot_doodle_svg: String,
    pub pop_up_text: String,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotDetailOut {
    pub position: usize,
    pub pop_up_text: String,
    pub description: String,
}

pub fn to_view(id: &str, game: &GameState) -> GameView {
    let scene = game.scene();
    let reveal_all = game.phase().is_terminal();
    let cards = game
        .order()
        .iter()
        .enumerate()
        .map(|(position, h)| {
            let selected = game.is_selected(position);
            HotspotCard {
                position,
                hotspot_doodle_svg: h.hotspot_doodle_svg.clone(),
                pop_up_text: h.pop_up_text.clone(),
                selected,
                is_valid: (reveal_all || selected).then_some(h.is_valid),
            }
        })
        .collect();

    GameView {
        id: id.to_string(),
        theme: scene.theme.clone(),
        summary: scene.summary.clone(),
        main_doodle_svg: scene.main_doodle_svg.clone(),
        doodle_description: scene.doodle_description.clone(),
        phase: game.phase(),
        correct_count: game.correct_count(),
        valid_total: game.valid_total(),
        cards,
    }
}

#[derive(Serialize)]
pub struct CatalogOut {
    pub difficulties: Vec<DifficultyOut>,
    pub languages: Vec<LanguageOut>,
}

#[derive(Serialize)]
pub struct DifficultyOut {
    pub code: &'static str,
    pub description: &'static str,
    #[serde(rename = "ageRange")]
    pub age_range: &'static str,
    pub hotspots: usize,
    pub distractors: usize,
}

#[derive(Serialize)]
pub struct LanguageOut {
    pub code: &'static str,
    pub description: &'static str,
}

pub fn catalog() -> CatalogOut {
    CatalogOut {
        difficulties: Difficulty::ALL
            .into_iter()
            .map(|d| DifficultyOut {
                code: d.code(),
                description: d.description(),
                age_range: d.age_range(),
                hotspots: d.hotspot_count(),
                distractors: d.distractor_count(),
            })
            .collect(),
        languages: Language::ALL
            .into_iter()
            .map(|l| LanguageOut { code: l.code(), description: l.description() })
            .collect(),
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_message_decodes_with_defaults() {
        let msg: ClientWsMessage = serde_json::from_value(json!({
            "type": "generate_adventure",
            "text": "Bees pollinate flowers."
        }))
        .unwrap();
        match msg {
            ClientWsMessage::GenerateAdventure(g) => {
                assert_eq!(g.difficulty, Difficulty::Easy);
                assert_eq!(g.language, Language::En);
                assert!(g.image_data_url.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_kinds_and_codes_are_rejected() {
        assert!(serde_json::from_value::<ClientWsMessage>(json!({ "type": "launch_rocket" })).is_err());
        assert!(serde_json::from_value::<ClientWsMessage>(json!({
            "type": "generate_adventure", "text": "x", "difficulty": "nightmare"
        }))
        .is_err());
        assert!(serde_json::from_value::<ClientWsMessage>(json!({ "type": "select_hotspot", "gameId": "g" })).is_err());
    }

    #[test]
    fn select_message_decodes() {
        let msg: ClientWsMessage =
            serde_json::from_value(json!({ "type": "select_hotspot", "gameId": "g1", "position": 3 })).unwrap();
        assert!(matches!(msg, ClientWsMessage::SelectHotspot(HotspotIn { ref game_id, position: 3 }) if game_id == "g1"));
    }

    #[test]
    fn server_messages_are_tagged() {
        let v = serde_json::to_value(ServerWsMessage::ModelStatus { status: ModelStatus::Downloading, progress: Some(42) }).unwrap();
        assert_eq!(v, json!({ "type": "model_status", "status": "downloading", "progress": 42 }));
        let v = serde_json::to_value(ServerWsMessage::ModelStatus { status: ModelStatus::Generating, progress: None }).unwrap();
        assert_eq!(v, json!({ "type": "model_status", "status": "generating" }));
    }

    #[test]
    fn catalog_lists_every_code() {
        let c = catalog();
        assert_eq!(c.difficulties.len(), 4);
        assert_eq!(c.difficulties[1].hotspots, 9);
        assert_eq!(c.languages.iter().map(|l| l.code).collect::<Vec<_>>(), vec!["en", "es", "ja"]);
    }

    #[test]
    fn game_view_uses_camel_case() {
        use crate::domain::Scene;
        use crate::prompt::GOLDEN_EXAMPLE;
        use rand::{rngs::StdRng, SeedableRng};

        let scene = serde_json::from_str::<Vec<Scene>>(GOLDEN_EXAMPLE).unwrap().remove(0);
        let game = GameState::new(scene, &mut StdRng::seed_from_u64(3)).unwrap();
        let v = serde_json::to_value(to_view("g1", &game)).unwrap();
        for key in ["mainDoodleSvg", "doodleDescription", "correctCount", "validTotal"] {
            assert!(v.get(key).is_some(), "{}", key);
        }
        let card = &v["cards"][0];
        assert!(card.get("popUpText").is_some() && card.get("hotspotDoodleSvg").is_some());
        assert!(card.get("isValid").is_none());

        let detail = serde_json::to_value(HotspotDetailOut { position: 0, pop_up_text: "Soap".into(), description: "d".into() }).unwrap();
        assert_eq!(detail, json!({ "position": 0, "popUpText": "Soap", "description": "d" }));
    }
}
