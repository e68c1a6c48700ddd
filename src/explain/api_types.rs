//! Serde types matching the Gemini `generateContent` endpoint.
//!
//! Only the fields the explanation flow reads are modelled; everything else
//! in the response is ignored.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGenerateRequest {
  pub contents: Vec<ApiContent>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGenerationConfig {
  pub response_mime_type: String,
}

impl ApiGenerateRequest {
  /// Single-turn request carrying one text prompt.
  pub fn prompt(text: String) -> Self {
    Self {
      contents: vec![ApiContent {
        parts: vec![ApiPart { text: Some(text) }],
      }],
      generation_config: None,
    }
  }

  /// Same as `prompt`, asking for a JSON reply.
  pub fn json_prompt(text: String) -> Self {
    Self {
      generation_config: Some(ApiGenerationConfig {
        response_mime_type: "application/json".to_string(),
      }),
      ..Self::prompt(text)
    }
  }
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ApiContent {
  #[serde(default)]
  pub parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiPart {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiGenerateResponse {
  #[serde(default)]
  pub candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCandidate {
  #[serde(default)]
  pub content: ApiContent,
}

impl ApiGenerateResponse {
  /// Text of the first candidate, parts joined. None if blank.
  pub fn into_text(self) -> Option<String> {
    let candidate = self.candidates.into_iter().next()?;
    let text: String = candidate
      .content
      .parts
      .into_iter()
      .filter_map(|part| part.text)
      .collect();

    let trimmed = text.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(trimmed.to_string())
    }
  }
}
