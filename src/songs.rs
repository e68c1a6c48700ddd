//! Songs found through AI search, persisted alongside the bundled library.
//!
//! Search needs the network: it is refused while offline and never falls
//! back to anything local. A found song is prepended to the custom list and
//! written through before it is returned.

use chrono::Utc;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};
use url::Url;

use crate::connectivity::ConnectivityMonitor;
use crate::storage::{KeyValueStore, StorageKey};

/// A song as stored under the custom songs key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
  pub id: String,
  pub title: String,
  pub reference: String,
  pub lyrics: Vec<String>,
  pub category: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

/// Song fields returned by the search service, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FoundSong {
  pub title: String,
  #[serde(default)]
  pub reference: String,
  #[serde(default)]
  pub lyrics: Vec<String>,
  #[serde(default)]
  pub category: String,
}

/// Source of songs for a free-text query.
///
/// Any failure comes back as `None`. Implementations do not retry.
pub trait SongFetcher: Send + Sync {
  fn find_song(&self, query: &str) -> impl Future<Output = Option<FoundSong>> + Send;
}

/// Outcome of an AI song search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongSearch {
  /// Saved at the front of the custom songs
  Found(Song),
  /// Search needs connectivity; nothing was fetched
  Offline,
  /// Blank query, or the service had nothing
  NotFound,
}

/// Custom songs, most recent first.
pub struct CustomSongs<K: KeyValueStore> {
  kv: K,
  songs: Vec<Song>,
}

impl<K: KeyValueStore> CustomSongs<K> {
  pub fn open(kv: K) -> Result<Self> {
    let songs = kv.load(StorageKey::CustomSongs)?.unwrap_or_default();
    Ok(Self { kv, songs })
  }

  pub fn list(&self) -> &[Song] {
    &self.songs
  }

  pub fn get(&self, id: &str) -> Option<&Song> {
    self.songs.iter().find(|s| s.id == id)
  }

  /// Assign an id to `found` and save it at the front.
  pub fn add(&mut self, found: FoundSong) -> Result<Song> {
    let song = Song {
      id: self.next_id(),
      image: cover_image(&found.title),
      title: found.title,
      reference: found.reference,
      lyrics: found.lyrics,
      category: found.category,
    };

    let mut next = Vec::with_capacity(self.songs.len() + 1);
    next.push(song.clone());
    next.extend(self.songs.iter().cloned());

    self.kv.store(StorageKey::CustomSongs, &next)?;
    self.songs = next;
    debug!("Added custom song {} ({})", song.id, song.title);
    Ok(song)
  }

  /// Search for a song and keep the result.
  pub async fn search<S: SongFetcher>(
    &mut self,
    connectivity: &ConnectivityMonitor,
    fetcher: &S,
    query: &str,
  ) -> Result<SongSearch> {
    let query = query.trim();
    if query.is_empty() {
      return Ok(SongSearch::NotFound);
    }

    if !connectivity.is_online() {
      info!("Offline, refusing song search for '{}'", query);
      return Ok(SongSearch::Offline);
    }

    match fetcher.find_song(query).await {
      Some(found) => Ok(SongSearch::Found(self.add(found)?)),
      None => {
        warn!("No song found for '{}'", query);
        Ok(SongSearch::NotFound)
      }
    }
  }

  /// `ai-<millis>`, bumped past any id already taken.
  fn next_id(&self) -> String {
    let mut millis = Utc::now().timestamp_millis();
    loop {
      let id = format!("ai-{}", millis);
      if self.get(&id).is_none() {
        return id;
      }
      millis += 1;
    }
  }
}

fn cover_image(title: &str) -> Option<String> {
  let mut url = Url::parse("https://picsum.photos/seed/").ok()?;
  url
    .path_segments_mut()
    .ok()?
    .pop_if_empty()
    .extend([title, "800", "600"]);
  Some(url.to_string())
}
