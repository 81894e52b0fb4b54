//! Boundary checks for the page-extraction payload sent by the popup.
//!
//! Text is mandatory. The image is best-effort: a missing or undecodable data
//! URL is dropped with a warning and never fails the request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use crate::error::QuestError;
use crate::model::ImageInput;

/// Validate extracted page text.
pub fn require_text(text: &str) -> Result<&str, QuestError> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Err(QuestError::ContentExtractionFailed("page has no readable text".into()));
  }
  Ok(trimmed)
}

/// Decode an optional `data:<mime>;base64,<payload>` URL into image bytes.
pub fn decode_image(data_url: Option<&str>) -> Option<ImageInput> {
  let url = data_url?.trim();
  if url.is_empty() {
    return None;
  }
  match parse_data_url(url) {
    Ok(img) => Some(img),
    Err(reason) => {
      warn!(target: "doodle_quest", %reason, "Ignoring page image");
      None
    }
  }
}

fn parse_data_url(url: &str) -> Result<ImageInput, String> {
  let rest = url.strip_prefix("data:").ok_or("not a data URL")?;
  let (meta, payload) = rest.split_once(',').ok_or("data URL has no payload")?;
  let mime = meta.strip_suffix(";base64").ok_or("data URL is not base64-encoded")?;
  if !mime.starts_with("image/") {
    return Err(format!("unsupported mime type {:?}", mime));
  }
  let bytes = STANDARD.decode(payload.trim()).map_err(|e| e.to_string())?;
  if bytes.is_empty() {
    return Err("empty image".into());
  }
  Ok(ImageInput { mime: mime.to_string(), bytes })
}
