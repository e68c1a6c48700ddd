//! Favorite songs, persisted as a list of song identifiers.

use color_eyre::Result;
use tracing::debug;

use crate::storage::{KeyValueStore, StorageKey};

pub struct Favorites<K: KeyValueStore> {
  kv: K,
  song_ids: Vec<String>,
}

impl<K: KeyValueStore> Favorites<K> {
  pub fn open(kv: K) -> Result<Self> {
    let song_ids = kv.load(StorageKey::Favorites)?.unwrap_or_default();
    Ok(Self { kv, song_ids })
  }

  pub fn list(&self) -> &[String] {
    &self.song_ids
  }

  pub fn contains(&self, song_id: &str) -> bool {
    self.song_ids.iter().any(|id| id == song_id)
  }

  /// Add or remove a song. Returns whether it is now a favorite.
  pub fn toggle(&mut self, song_id: &str) -> Result<bool> {
    let now_favorite = !self.contains(song_id);
    let next: Vec<String> = if now_favorite {
      let mut next = self.song_ids.clone();
      next.push(song_id.to_string());
      next
    } else {
      self
        .song_ids
        .iter()
        .filter(|id| *id != song_id)
        .cloned()
        .collect()
    };

    self.kv.store(StorageKey::Favorites, &next)?;
    self.song_ids = next;
    debug!("Favorite {} -> {}", song_id, now_favorite);
    Ok(now_favorite)
  }
}
