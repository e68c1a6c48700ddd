use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub gemini: GeminiConfig,
  /// Language explanations are requested in
  #[serde(default = "default_language")]
  pub language: String,
  /// Store location (defaults to $XDG_DATA_HOME/sacred-melodies/store.db)
  pub database: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      gemini: GeminiConfig::default(),
      language: default_language(),
      database: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default = "default_model")]
  pub model: String,
  /// Request timeout; a timed-out request counts as a failed fetch
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for GeminiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      model: default_model(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_base_url() -> String {
  "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
  "gemini-2.5-flash".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_language() -> String {
  "Bengali".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sacred-melodies.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sacred-melodies/config.yaml
  ///
  /// Without a config file every setting takes its default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sacred-melodies.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sacred-melodies").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the explanation service API key from environment variables.
  ///
  /// Checks SACRED_MELODIES_API_KEY first, then GEMINI_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("SACRED_MELODIES_API_KEY")
      .or_else(|_| std::env::var("GEMINI_API_KEY"))
      .map_err(|_| {
        eyre!("API key not found. Set SACRED_MELODIES_API_KEY or GEMINI_API_KEY environment variable.")
      })
  }
}
