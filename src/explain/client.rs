use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{ApiGenerateRequest, ApiGenerateResponse};
use super::ExplanationFetcher;
use crate::config::Config;
use crate::songs::{FoundSong, SongFetcher};

/// Gemini API client for verse explanations and song search
#[derive(Clone)]
pub struct GeminiClient {
  http: reqwest::Client,
  endpoint: Url,
  api_key: Option<String>,
  language: String,
}

impl GeminiClient {
  /// Create a client from configuration.
  ///
  /// Without an API key the client still builds; every fetch then fails,
  /// which leaves saved studies usable.
  pub fn new(config: &Config, api_key: Option<String>) -> Result<Self> {
    let endpoint = Self::endpoint(&config.gemini.base_url, &config.gemini.model)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.gemini.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      endpoint,
      api_key,
      language: config.language.clone(),
    })
  }

  fn endpoint(base_url: &str, model: &str) -> Result<Url> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
      base.push('/');
    }

    Url::parse(&base)
      .and_then(|url| url.join(&format!("v1beta/models/{}:generateContent", model)))
      .map_err(|e| eyre!("Invalid explanation service URL {}: {}", base_url, e))
  }

  fn prompt(&self, reference: &str) -> String {
    format!(
      "Explain the Bible verse or passage \"{}\" in {}. \
       Give its context, its meaning and a short application for daily life. \
       Keep it concise and devotional.",
      reference, self.language
    )
  }

  fn song_prompt(&self, query: &str) -> String {
    format!(
      "Find the Christian song or hymn best matching \"{}\" and write its lyrics in {}. \
       Reply with a JSON object with the fields \"title\" (string), \"reference\" \
       (the related scripture reference), \"lyrics\" (array of lines, blank strings \
       between verses) and \"category\" (string).",
      query, self.language
    )
  }

  async fn generate(&self, request: &ApiGenerateRequest) -> Result<String> {
    let api_key = self
      .api_key
      .as_deref()
      .ok_or_else(|| eyre!("No API key configured"))?;

    let body =
      serde_json::to_vec(request).map_err(|e| eyre!("Failed to encode request: {}", e))?;

    let response = self
      .http
      .post(self.endpoint.clone())
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", api_key)
      .body(body)
      .send()
      .await
      .map_err(|e| eyre!("Request failed: {}", e))?;

    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response: {}", e))?;

    if !status.is_success() {
      return Err(eyre!(
        "Service returned {}: {}",
        status,
        String::from_utf8_lossy(&bytes)
      ));
    }

    let parsed: ApiGenerateResponse =
      serde_json::from_slice(&bytes).map_err(|e| eyre!("Failed to parse response: {}", e))?;

    parsed
      .into_text()
      .ok_or_else(|| eyre!("Response contained no explanation"))
  }
}

/// Parse a song from a JSON reply, tolerating a fenced code block.
fn parse_song(text: &str) -> Result<FoundSong> {
  let body = text
    .trim()
    .trim_start_matches("```json")
    .trim_start_matches("```")
    .trim_end_matches("```")
    .trim();

  let song: FoundSong =
    serde_json::from_str(body).map_err(|e| eyre!("Failed to parse song: {}", e))?;
  if song.title.trim().is_empty() {
    return Err(eyre!("Song has no title"));
  }
  Ok(song)
}

impl ExplanationFetcher for GeminiClient {
  async fn explain(&self, reference: &str) -> Option<String> {
    debug!("Requesting explanation for '{}'", reference);
    let request = ApiGenerateRequest::prompt(self.prompt(reference));
    match self.generate(&request).await {
      Ok(content) => Some(content),
      Err(e) => {
        warn!("Explanation for '{}' unavailable: {}", reference, e);
        None
      }
    }
  }
}

impl SongFetcher for GeminiClient {
  async fn find_song(&self, query: &str) -> Option<FoundSong> {
    debug!("Searching for song '{}'", query);
    let request = ApiGenerateRequest::json_prompt(self.song_prompt(query));
    match self.generate(&request).await.and_then(|text| parse_song(&text)) {
      Ok(song) => Some(song),
      Err(e) => {
        warn!("Song search for '{}' failed: {}", query, e);
        None
      }
    }
  }
}
