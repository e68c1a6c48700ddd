//! In-place refresh of saved studies.

use color_eyre::Result;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::types::SyncOutcome;
use super::{lock_store, SharedStore};
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::explain::ExplanationFetcher;
use crate::storage::KeyValueStore;

type InFlightSet = Arc<Mutex<HashSet<String>>>;

/// Marks one entry as syncing until dropped.
struct InFlightGuard {
  id: String,
  in_flight: InFlightSet,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    // Clear even if another holder panicked
    let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
    set.remove(&self.id);
  }
}

/// Re-fetches saved entries and updates them in place.
///
/// At most one sync per entry id runs at a time. A failed sync never
/// touches the saved content.
pub struct SyncCoordinator<F, K: KeyValueStore> {
  connectivity: ConnectivityMonitor,
  store: SharedStore<K>,
  fetcher: Arc<F>,
  in_flight: InFlightSet,
}

impl<F: ExplanationFetcher, K: KeyValueStore> SyncCoordinator<F, K> {
  pub fn new(connectivity: ConnectivityMonitor, store: SharedStore<K>, fetcher: Arc<F>) -> Self {
    Self {
      connectivity,
      store,
      fetcher,
      in_flight: Arc::new(Mutex::new(HashSet::new())),
    }
  }

  /// Whether a sync for `id` is currently running.
  pub fn is_syncing(&self, id: &str) -> bool {
    let set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
    set.contains(id)
  }

  /// Check-and-set of the in-flight marker, with no suspension in between.
  fn begin(&self, id: &str) -> Option<InFlightGuard> {
    let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
    if !set.insert(id.to_string()) {
      return None;
    }
    Some(InFlightGuard {
      id: id.to_string(),
      in_flight: Arc::clone(&self.in_flight),
    })
  }

  /// Refresh one saved entry.
  pub async fn sync(&self, id: &str) -> Result<SyncOutcome> {
    if !self.connectivity.is_online() {
      debug!("Offline, rejecting sync for {}", id);
      return Ok(SyncOutcome::Offline);
    }

    let reference = {
      let store = lock_store(&self.store)?;
      match store.get(id) {
        Some(entry) => entry.reference.clone(),
        None => return Ok(SyncOutcome::NotFound),
      }
    };

    let _guard = match self.begin(id) {
      Some(guard) => guard,
      None => {
        info!("Sync for {} already in flight", id);
        return Ok(SyncOutcome::InFlight);
      }
    };

    info!("Syncing study {} ({})", id, reference);
    let content = match self.fetcher.explain(&reference).await {
      Some(content) => content,
      None => {
        warn!("Sync for {} failed, keeping saved content", id);
        return Ok(SyncOutcome::Failed);
      }
    };

    let mut store = lock_store(&self.store)?;
    if store.get(id).is_none() {
      info!("Study {} was deleted during sync, discarding result", id);
      return Ok(SyncOutcome::NotFound);
    }

    let entry = store.upsert(&reference, &content)?;
    info!("Synced study {}", id);
    Ok(SyncOutcome::Synced(entry))
  }

  /// Refresh every saved entry concurrently.
  pub async fn sync_all(&self) -> Result<Vec<(String, SyncOutcome)>> {
    let ids: Vec<String> = lock_store(&self.store)?
      .entries()
      .iter()
      .map(|e| e.id.clone())
      .collect();

    let mut pending = Vec::with_capacity(ids.len());
    for id in &ids {
      pending.push(self.sync(id));
    }
    let results = join_all(pending).await;

    ids
      .into_iter()
      .zip(results)
      .map(|(id, result)| result.map(|outcome| (id, outcome)))
      .collect()
  }

  /// Sync everything on each offline-to-online transition.
  ///
  /// Runs until the event stream closes. Redundant `online` notifications
  /// while already online do nothing, including after missed events.
  pub async fn run_on_reconnect(&self, mut events: broadcast::Receiver<ConnectivityEvent>) {
    let mut was_online = self.connectivity.is_online();

    loop {
      let reconnected = match events.recv().await {
        Ok(event) => {
          was_online = event.online;
          event.is_reconnect()
        }
        Err(RecvError::Lagged(skipped)) => {
          // Only an offline-to-online edge across the gap counts
          debug!("Missed {} connectivity events", skipped);
          let online = self.connectivity.is_online();
          let reconnected = !was_online && online;
          was_online = online;
          reconnected
        }
        Err(RecvError::Closed) => break,
      };

      if reconnected {
        info!("Back online, syncing saved studies");
        match self.sync_all().await {
          Ok(results) => {
            let synced = results.iter().filter(|(_, o)| o.is_success()).count();
            info!("Reconnect sync: {}/{} studies refreshed", synced, results.len());
          }
          Err(e) => warn!("Reconnect sync failed: {}", e),
        }
      }
    }
  }
}

impl<F, K: KeyValueStore> Clone for SyncCoordinator<F, K> {
  fn clone(&self) -> Self {
    Self {
      connectivity: self.connectivity.clone(),
      store: Arc::clone(&self.store),
      fetcher: Arc::clone(&self.fetcher),
      in_flight: Arc::clone(&self.in_flight),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;
  use crate::study::testing::{entry, shared_store, ScriptedFetcher};
  use crate::study::StudyEntry;
  use std::time::Duration;

  fn coordinator(
    online: bool,
    entries: &[StudyEntry],
    fetcher: ScriptedFetcher,
  ) -> (SyncCoordinator<ScriptedFetcher, MemoryStore>, Arc<ScriptedFetcher>) {
    let fetcher = Arc::new(fetcher);
    let coordinator = SyncCoordinator::new(
      ConnectivityMonitor::new(online),
      shared_store(entries),
      Arc::clone(&fetcher),
    );
    (coordinator, fetcher)
  }

  fn content_of(coordinator: &SyncCoordinator<ScriptedFetcher, MemoryStore>, id: &str) -> String {
    lock_store(&coordinator.store)
      .unwrap()
      .get(id)
      .unwrap()
      .content
      .clone()
  }

  #[tokio::test]
  async fn test_sync_refreshes_in_place() {
    let (coordinator, _) = coordinator(
      true,
      &[entry("a", "John 3:16", "X"), entry("b", "Psalm 23", "Z")],
      ScriptedFetcher::answering("fresh"),
    );

    let outcome = coordinator.sync("b").await.unwrap();

    let updated = match outcome {
      SyncOutcome::Synced(entry) => entry,
      other => panic!("expected synced, got {:?}", other),
    };
    assert_eq!(updated.id, "b");
    assert_eq!(updated.content, "fresh");
    assert!(updated.updated_at > entry("b", "Psalm 23", "Z").updated_at);

    let store = lock_store(&coordinator.store).unwrap();
    let ids: Vec<&str> = store.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_failed_sync_preserves_content() {
    let (coordinator, fetcher) = coordinator(
      true,
      &[entry("z", "Mark 1:1", "Z")],
      ScriptedFetcher::failing(),
    );

    assert_eq!(coordinator.sync("z").await.unwrap(), SyncOutcome::Failed);
    assert_eq!(content_of(&coordinator, "z"), "Z");
    assert_eq!(fetcher.calls(), 1);
    assert!(!coordinator.is_syncing("z"));
  }

  #[tokio::test]
  async fn test_offline_sync_is_rejected() {
    let (coordinator, fetcher) = coordinator(
      false,
      &[entry("z", "Mark 1:1", "Z")],
      ScriptedFetcher::answering("fresh"),
    );

    assert_eq!(coordinator.sync("z").await.unwrap(), SyncOutcome::Offline);
    assert_eq!(content_of(&coordinator, "z"), "Z");
    assert_eq!(fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_unknown_id() {
    let (coordinator, fetcher) = coordinator(true, &[], ScriptedFetcher::answering("fresh"));

    assert_eq!(coordinator.sync("nope").await.unwrap(), SyncOutcome::NotFound);
    assert_eq!(fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_concurrent_sync_same_entry_fetches_once() {
    let (coordinator, fetcher) = coordinator(
      true,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh").with_delay(Duration::from_millis(20)),
    );

    let (first, second) = tokio::join!(
      coordinator.sync("a"),
      async {
        // Let the first sync reach its fetch
        tokio::task::yield_now().await;
        assert!(coordinator.is_syncing("a"));
        coordinator.sync("a").await
      }
    );

    assert!(first.unwrap().is_success());
    assert_eq!(second.unwrap(), SyncOutcome::InFlight);
    assert_eq!(fetcher.calls(), 1);
    assert!(!coordinator.is_syncing("a"));

    // Marker released, a later sync runs normally
    assert!(coordinator.sync("a").await.unwrap().is_success());
    assert_eq!(fetcher.calls(), 2);
  }

  #[tokio::test]
  async fn test_dropped_sync_releases_marker() {
    let (coordinator, _) = coordinator(
      true,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh").with_delay(Duration::from_secs(60)),
    );

    let timed_out = tokio::time::timeout(Duration::from_millis(10), coordinator.sync("a")).await;

    assert!(timed_out.is_err());
    assert!(!coordinator.is_syncing("a"));
    assert_eq!(content_of(&coordinator, "a"), "X");
  }

  #[tokio::test]
  async fn test_deleted_during_sync_is_discarded() {
    let (coordinator, _) = coordinator(
      true,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh").with_delay(Duration::from_millis(20)),
    );

    let (outcome, _) = tokio::join!(coordinator.sync("a"), async {
      tokio::task::yield_now().await;
      lock_store(&coordinator.store).unwrap().remove("a").unwrap();
    });

    assert_eq!(outcome.unwrap(), SyncOutcome::NotFound);
    let store = lock_store(&coordinator.store).unwrap();
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn test_sync_all_covers_every_entry() {
    let (coordinator, fetcher) = coordinator(
      true,
      &[entry("a", "John 3:16", "X"), entry("b", "Psalm 23", "Z")],
      ScriptedFetcher::answering("fresh"),
    );

    let results = coordinator.sync_all().await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, o)| o.is_success()));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(content_of(&coordinator, "a"), "fresh");
    assert_eq!(content_of(&coordinator, "b"), "fresh");
  }

  #[tokio::test]
  async fn test_reconnect_triggers_sync_once() {
    let (coordinator, fetcher) = coordinator(
      false,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh"),
    );
    let monitor = coordinator.connectivity.clone();
    let events = monitor.subscribe();
    let task = {
      let coordinator = coordinator.clone();
      tokio::spawn(async move { coordinator.run_on_reconnect(events).await })
    };

    monitor.set_online(true);
    monitor.set_online(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(content_of(&coordinator, "a"), "fresh");
    task.abort();
  }

  #[tokio::test]
  async fn test_lagged_redundant_online_does_not_sync() {
    let (coordinator, fetcher) = coordinator(
      true,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh"),
    );
    let monitor = coordinator.connectivity.clone();
    let events = monitor.subscribe();
    let task = {
      let coordinator = coordinator.clone();
      tokio::spawn(async move { coordinator.run_on_reconnect(events).await })
    };

    // More notifications than the channel holds, all while already online
    for _ in 0..20 {
      monitor.set_online(true);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(content_of(&coordinator, "a"), "X");
    task.abort();
  }

  #[tokio::test]
  async fn test_lagged_reconnect_still_syncs() {
    let (coordinator, fetcher) = coordinator(
      false,
      &[entry("a", "John 3:16", "X")],
      ScriptedFetcher::answering("fresh"),
    );
    let monitor = coordinator.connectivity.clone();
    let events = monitor.subscribe();
    let task = {
      let coordinator = coordinator.clone();
      tokio::spawn(async move { coordinator.run_on_reconnect(events).await })
    };
    // Let the watcher start while offline
    tokio::task::yield_now().await;

    // The reconnect itself falls out of the channel
    monitor.set_online(true);
    for _ in 0..20 {
      monitor.set_online(true);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(content_of(&coordinator, "a"), "fresh");
    task.abort();
  }

  #[test]
  fn test_is_syncing_survives_poisoned_marker() {
    let (coordinator, _) = coordinator(true, &[], ScriptedFetcher::failing());
    let guard = coordinator.begin("a").unwrap();

    let in_flight = Arc::clone(&coordinator.in_flight);
    let _ = std::thread::spawn(move || {
      let _set = in_flight.lock().unwrap();
      panic!("poison the marker set");
    })
    .join();

    assert!(coordinator.in_flight.is_poisoned());
    assert!(coordinator.is_syncing("a"));
    assert!(coordinator.begin("a").is_none());

    drop(guard);
    assert!(!coordinator.is_syncing("a"));
  }
}
