//! Durable key-value persistence for app state.
//!
//! Values are JSON documents stored under a fixed set of keys. The study
//! store and favorites write through to this medium on every mutation and
//! read from it once at startup.

mod memory;
mod sqlite;

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Fixed keys of the persistence medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
  /// List of favorite song identifiers
  Favorites,
  /// List of saved study entries
  SavedStudies,
  /// Songs added through AI search
  CustomSongs,
  /// Theme preference
  Theme,
  /// User profile
  User,
}

impl StorageKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Favorites => "sm_favorites",
      Self::SavedStudies => "sm_saved_studies",
      Self::CustomSongs => "sm_custom_songs",
      Self::Theme => "sm_theme",
      Self::User => "sm_user",
    }
  }
}

/// Trait for key-value persistence backends.
pub trait KeyValueStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get(&self, key: StorageKey) -> Result<Option<String>>;

  /// Replace the raw value stored under `key`.
  fn set(&self, key: StorageKey, value: &str) -> Result<()>;

  /// Read and deserialize a JSON value.
  ///
  /// A value that no longer parses is an error rather than an empty result,
  /// so callers never overwrite data they failed to read.
  fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
    match self.get(key)? {
      Some(raw) => serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| eyre!("Failed to parse stored value '{}': {}", key.as_str(), e)),
      None => Ok(None),
    }
  }

  /// Serialize and write a JSON value.
  fn store<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
      .map_err(|e| eyre!("Failed to serialize value '{}': {}", key.as_str(), e))?;
    self.set(key, &raw)
  }
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<K> {
  fn get(&self, key: StorageKey) -> Result<Option<String>> {
    (**self).get(key)
  }

  fn set(&self, key: StorageKey, value: &str) -> Result<()> {
    (**self).set(key, value)
  }
}
