//! Offline-first study cache.
//!
//! This module decides where explanation content comes from:
//! - Online: always a fresh fetch, with the saved entry as fallback on failure
//! - Offline: the saved entry only, never a fetch
//! - Saving is explicit and separate from resolution
//! - Saved entries can be re-fetched in place (sync), one in-flight sync per entry

mod resolver;
pub mod seed;
mod store;
mod sync;
mod types;

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex, MutexGuard};

pub use resolver::StudyResolver;
pub use store::{initialize, StudyStore};
pub use sync::SyncCoordinator;
pub use types::{
  normalize_reference, Explanation, ExplanationSource, Resolution, StudyEntry, SyncOutcome,
};

/// Store handle shared by the resolver, the sync coordinator and the caller.
pub type SharedStore<K> = Arc<Mutex<StudyStore<K>>>;

pub(crate) fn lock_store<K: crate::storage::KeyValueStore>(
  store: &SharedStore<K>,
) -> Result<MutexGuard<'_, StudyStore<K>>> {
  store.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}
