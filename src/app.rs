use color_eyre::Result;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::connectivity::ConnectivityMonitor;
use crate::explain::ExplanationFetcher;
use crate::favorites::Favorites;
use crate::songs::{CustomSongs, Song, SongFetcher, SongSearch};
use crate::storage::KeyValueStore;
use crate::study::seed::seed_entries;
use crate::study::{
  lock_store, Explanation, Resolution, SharedStore, StudyEntry, StudyResolver, StudyStore,
  SyncCoordinator, SyncOutcome,
};
use crate::task::Pending;

/// Owner of all study state.
///
/// Holds the connectivity flag, the store and the fetcher, and hands the
/// resolver and sync coordinator shared access to them. Callers receive
/// entries by value.
pub struct App<F, K: KeyValueStore + Clone> {
  connectivity: ConnectivityMonitor,
  store: SharedStore<K>,
  favorites: Favorites<K>,
  songs: CustomSongs<K>,
  fetcher: Arc<F>,
  resolver: StudyResolver<F, K>,
  sync: SyncCoordinator<F, K>,
}

impl<F: ExplanationFetcher, K: KeyValueStore + Clone> App<F, K> {
  /// Open persisted state from `kv` and merge in the bundled studies.
  pub fn new(connectivity: ConnectivityMonitor, kv: K, fetcher: F) -> Result<Self> {
    let store: SharedStore<K> = Arc::new(Mutex::new(StudyStore::open(
      kv.clone(),
      &seed_entries(),
    )?));
    let songs = CustomSongs::open(kv.clone())?;
    let favorites = Favorites::open(kv)?;
    let fetcher = Arc::new(fetcher);

    let resolver = StudyResolver::new(
      connectivity.clone(),
      Arc::clone(&store),
      Arc::clone(&fetcher),
    );
    let sync = SyncCoordinator::new(
      connectivity.clone(),
      Arc::clone(&store),
      Arc::clone(&fetcher),
    );

    Ok(Self {
      connectivity,
      store,
      favorites,
      songs,
      fetcher,
      resolver,
      sync,
    })
  }

  pub fn connectivity(&self) -> &ConnectivityMonitor {
    &self.connectivity
  }

  pub async fn resolve(&self, reference: &str) -> Result<Resolution> {
    self.resolver.resolve(reference).await
  }

  /// Save an explanation for offline use.
  pub fn save(&self, explanation: &Explanation) -> Result<StudyEntry> {
    let entry = lock_store(&self.store)?.upsert(&explanation.reference, &explanation.content)?;
    info!("Saved study {} ({})", entry.id, entry.reference);
    Ok(entry)
  }

  /// Saved studies, most recent first.
  pub fn saved(&self) -> Result<Vec<StudyEntry>> {
    Ok(lock_store(&self.store)?.entries().to_vec())
  }

  pub fn find_saved(&self, reference: &str) -> Result<Option<StudyEntry>> {
    Ok(lock_store(&self.store)?.find(reference).cloned())
  }

  pub fn delete(&self, id: &str) -> Result<bool> {
    lock_store(&self.store)?.remove(id)
  }

  pub async fn sync(&self, id: &str) -> Result<SyncOutcome> {
    self.sync.sync(id).await
  }

  pub async fn sync_all(&self) -> Result<Vec<(String, SyncOutcome)>> {
    self.sync.sync_all().await
  }

  pub fn is_syncing(&self, id: &str) -> bool {
    self.sync.is_syncing(id)
  }

  pub fn favorites(&self) -> &[String] {
    self.favorites.list()
  }

  pub fn toggle_favorite(&mut self, song_id: &str) -> Result<bool> {
    self.favorites.toggle(song_id)
  }

  /// Songs found through search, most recent first.
  pub fn custom_songs(&self) -> &[Song] {
    self.songs.list()
  }
}

impl<F: ExplanationFetcher + SongFetcher, K: KeyValueStore + Clone> App<F, K> {
  /// Look a song up online and keep it. Refused while offline.
  pub async fn search_song(&mut self, query: &str) -> Result<SongSearch> {
    self
      .songs
      .search(&self.connectivity, self.fetcher.as_ref(), query)
      .await
  }
}

impl<F, K> App<F, K>
where
  F: ExplanationFetcher + 'static,
  K: KeyValueStore + Clone + 'static,
{
  /// Resolve without waiting. Drop the handle to discard the result.
  pub fn resolve_in_background(&self, reference: &str) -> Pending<Result<Resolution>> {
    let resolver = self.resolver.clone();
    let reference = reference.to_string();
    Pending::spawn(async move { resolver.resolve(&reference).await })
  }

  /// Start syncing all saved studies on every reconnect.
  pub fn spawn_reconnect_sync(&self) -> JoinHandle<()> {
    let sync = self.sync.clone();
    let events = self.connectivity.subscribe();
    tokio::spawn(async move { sync.run_on_reconnect(events).await })
  }
}
