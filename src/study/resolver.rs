//! Resolution of a reference to explanation content.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{Explanation, Resolution};
use super::{lock_store, SharedStore};
use crate::connectivity::ConnectivityMonitor;
use crate::explain::ExplanationFetcher;
use crate::storage::KeyValueStore;

/// Decides between a fresh fetch and the saved entry.
///
/// Online resolution always fetches; the saved entry is only a fallback
/// when the fetch fails. Offline resolution never fetches. Resolution never
/// writes to the store.
pub struct StudyResolver<F, K: KeyValueStore> {
  connectivity: ConnectivityMonitor,
  store: SharedStore<K>,
  fetcher: Arc<F>,
}

impl<F: ExplanationFetcher, K: KeyValueStore> StudyResolver<F, K> {
  pub fn new(connectivity: ConnectivityMonitor, store: SharedStore<K>, fetcher: Arc<F>) -> Self {
    Self {
      connectivity,
      store,
      fetcher,
    }
  }

  /// Resolve explanation content for `reference`.
  ///
  /// 1. Offline with a saved entry: serve it
  /// 2. Offline without one: unavailable
  /// 3. Online: fetch; on failure fall back to the saved entry (degraded)
  ///    or fail if there is none
  pub async fn resolve(&self, reference: &str) -> Result<Resolution> {
    if reference.trim().is_empty() {
      debug!("Ignoring blank reference");
      return Ok(Resolution::Failed);
    }

    let existing = lock_store(&self.store)?.find(reference).cloned();

    if !self.connectivity.is_online() {
      return Ok(match existing {
        Some(entry) => {
          debug!("Offline, serving saved study for '{}'", reference);
          Resolution::Resolved(Explanation::offline(entry))
        }
        None => {
          info!("Offline and nothing saved for '{}'", reference);
          Resolution::UnavailableOffline
        }
      });
    }

    match self.fetcher.explain(reference).await {
      Some(content) => Ok(Resolution::Resolved(Explanation::from_network(
        reference, content,
      ))),
      None => match existing {
        Some(entry) => {
          warn!(
            "Fetch for '{}' failed, falling back to saved study {}",
            reference, entry.id
          );
          Ok(Resolution::Resolved(Explanation::degraded(entry)))
        }
        None => {
          warn!("Fetch for '{}' failed with nothing saved", reference);
          Ok(Resolution::Failed)
        }
      },
    }
  }
}

impl<F, K: KeyValueStore> Clone for StudyResolver<F, K> {
  fn clone(&self) -> Self {
    Self {
      connectivity: self.connectivity.clone(),
      store: Arc::clone(&self.store),
      fetcher: Arc::clone(&self.fetcher),
    }
  }
}
