//! Saved studies with write-through persistence.

use chrono::Utc;
use color_eyre::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::types::{normalize_reference, StudyEntry};
use crate::storage::{KeyValueStore, StorageKey};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Merge bundled seeds into persisted entries.
///
/// Persisted entries come first in their stored order, then every seed whose
/// normalized reference is not already present. A seed is never merged into
/// an existing entry. Duplicate references within `persisted` collapse to the
/// first occurrence.
pub fn initialize(seeds: &[StudyEntry], persisted: Vec<StudyEntry>) -> Vec<StudyEntry> {
  let mut seen: HashSet<String> = HashSet::new();
  let mut combined = Vec::with_capacity(persisted.len() + seeds.len());

  for entry in persisted {
    if seen.insert(normalize_reference(&entry.reference)) {
      combined.push(entry);
    } else {
      debug!("Dropping duplicate saved study for '{}'", entry.reference);
    }
  }

  for seed in seeds {
    if seen.insert(normalize_reference(&seed.reference)) {
      combined.push(seed.clone());
    }
  }

  combined
}

/// Ordered collection of saved studies, most recent first.
///
/// The in-memory list is authoritative for reads. Every mutation writes the
/// full list to the key-value medium before it is applied in memory.
pub struct StudyStore<K: KeyValueStore> {
  kv: K,
  entries: Vec<StudyEntry>,
}

impl<K: KeyValueStore> StudyStore<K> {
  /// Load persisted studies and merge in the bundled seeds.
  pub fn open(kv: K, seeds: &[StudyEntry]) -> Result<Self> {
    let persisted: Vec<StudyEntry> = kv.load(StorageKey::SavedStudies)?.unwrap_or_default();
    let persisted_count = persisted.len();
    let entries = initialize(seeds, persisted);

    info!(
      "Study store ready: {} saved, {} total",
      persisted_count,
      entries.len()
    );

    Ok(Self { kv, entries })
  }

  pub fn entries(&self) -> &[StudyEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Case-insensitive lookup by reference.
  pub fn find(&self, reference: &str) -> Option<&StudyEntry> {
    let key = normalize_reference(reference);
    self
      .entries
      .iter()
      .find(|e| normalize_reference(&e.reference) == key)
  }

  /// Lookup by entry id.
  pub fn get(&self, id: &str) -> Option<&StudyEntry> {
    self.entries.iter().find(|e| e.id == id)
  }

  /// Save content for a reference.
  ///
  /// An existing entry keeps its id, reference and position; only content
  /// and timestamp change. A new entry goes to the front.
  pub fn upsert(&mut self, reference: &str, content: &str) -> Result<StudyEntry> {
    let mut next = self.entries.clone();
    let now = Utc::now();

    let entry = match next.iter_mut().find(|e| e.matches(reference)) {
      Some(existing) => {
        existing.content = content.to_string();
        existing.updated_at = now;
        debug!("Updated study {} ({})", existing.id, existing.reference);
        existing.clone()
      }
      None => {
        let entry = StudyEntry {
          id: self.generate_id(reference),
          reference: reference.to_string(),
          content: content.to_string(),
          updated_at: now,
        };
        debug!("Created study {} ({})", entry.id, entry.reference);
        next.insert(0, entry.clone());
        entry
      }
    };

    self.persist(next)?;
    Ok(entry)
  }

  /// Delete by id. Returns false (and writes nothing) if absent.
  pub fn remove(&mut self, id: &str) -> Result<bool> {
    if self.get(id).is_none() {
      return Ok(false);
    }

    let next: Vec<StudyEntry> = self
      .entries
      .iter()
      .filter(|e| e.id != id)
      .cloned()
      .collect();

    self.persist(next)?;
    debug!("Removed study {}", id);
    Ok(true)
  }

  fn persist(&mut self, next: Vec<StudyEntry>) -> Result<()> {
    self.kv.store(StorageKey::SavedStudies, &next)?;
    self.entries = next;
    Ok(())
  }

  fn generate_id(&self, reference: &str) -> String {
    loop {
      let mut hasher = Sha256::new();
      hasher.update(normalize_reference(reference).as_bytes());
      hasher.update(
        Utc::now()
          .timestamp_nanos_opt()
          .unwrap_or_default()
          .to_le_bytes(),
      );
      hasher.update(ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
      let id = format!("study-{}", &hex::encode(hasher.finalize())[..16]);

      if self.get(&id).is_none() {
        return id;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;
  use crate::study::seed::seed_entries;
  use chrono::DateTime;
  use color_eyre::eyre::eyre;
  use std::sync::Arc;

  fn entry(id: &str, reference: &str, content: &str) -> StudyEntry {
    StudyEntry {
      id: id.to_string(),
      reference: reference.to_string(),
      content: content.to_string(),
      updated_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
    }
  }

  fn refs(entries: &[StudyEntry]) -> Vec<String> {
    entries.iter().map(|e| e.reference.clone()).collect()
  }

  /// Medium that rejects every write.
  struct ReadOnlyStore;

  impl KeyValueStore for ReadOnlyStore {
    fn get(&self, _key: StorageKey) -> Result<Option<String>> {
      Ok(None)
    }

    fn set(&self, _key: StorageKey, _value: &str) -> Result<()> {
      Err(eyre!("disk full"))
    }
  }

  #[test]
  fn test_initialize_skips_seed_with_saved_reference() {
    let seeds = vec![
      entry("pre-1", "John 3:16", "seed content"),
      entry("pre-2", "Psalm 23:1", "shepherd"),
    ];
    let persisted = vec![entry("user-1", "JOHN 3:16", "my notes")];

    let merged = initialize(&seeds, persisted);

    assert_eq!(refs(&merged), vec!["JOHN 3:16", "Psalm 23:1"]);
    let john: Vec<_> = merged.iter().filter(|e| e.matches("john 3:16")).collect();
    assert_eq!(john.len(), 1);
    assert_eq!(john[0].content, "my notes");
    assert_eq!(john[0].id, "user-1");
  }

  #[test]
  fn test_initialize_is_idempotent() {
    let seeds = seed_entries();
    let persisted = vec![
      entry("user-1", "Romans 8:28", "all things"),
      entry("user-2", "john 3:16", "mine"),
    ];

    let once = initialize(&seeds, persisted);
    let twice = initialize(&seeds, once.clone());

    assert_eq!(once, twice);
  }

  #[test]
  fn test_initialize_collapses_duplicate_saved_references() {
    let persisted = vec![
      entry("a", "Mark 1:1", "first"),
      entry("b", "mark 1:1", "second"),
    ];

    let merged = initialize(&[], persisted);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].id, "a");
  }

  #[test]
  fn test_find_is_case_insensitive_and_whitespace_sensitive() {
    let store = StudyStore::open(MemoryStore::new(), &[entry("a", "John 3:16", "X")]).unwrap();

    assert_eq!(store.find("jOHN 3:16").map(|e| e.id.as_str()), Some("a"));
    assert!(store.find("John  3:16").is_none());
    assert!(store.find("John 3:16 ").is_none());
  }

  #[test]
  fn test_upsert_new_goes_to_front() {
    let mut store = StudyStore::open(MemoryStore::new(), &[entry("a", "John 3:16", "X")]).unwrap();

    let created = store.upsert("Psalm 23", "shepherd").unwrap();

    assert!(created.id.starts_with("study-"));
    assert_eq!(refs(store.entries()), vec!["Psalm 23", "John 3:16"]);
  }

  #[test]
  fn test_upsert_existing_preserves_id_and_position() {
    let seeds = vec![
      entry("a", "John 3:16", "X"),
      entry("b", "Romans 8:28", "Y"),
      entry("c", "Psalm 23", "Z"),
    ];
    let mut store = StudyStore::open(MemoryStore::new(), &seeds).unwrap();
    let before = store.get("b").unwrap().updated_at;

    let updated = store.upsert("ROMANS 8:28", "new").unwrap();

    assert_eq!(updated.id, "b");
    assert_eq!(updated.reference, "Romans 8:28");
    assert_eq!(updated.content, "new");
    assert!(updated.updated_at > before);
    assert_eq!(refs(store.entries()), vec!["John 3:16", "Romans 8:28", "Psalm 23"]);
  }

  #[test]
  fn test_upsert_keeps_references_unique() {
    let mut store = StudyStore::open(MemoryStore::new(), &[entry("a", "John 3:16", "X")]).unwrap();

    for (reference, content) in [
      ("john 3:16", "1"),
      ("Psalm 23", "2"),
      ("PSALM 23", "3"),
      ("Mark 1:1", "4"),
      ("John 3:16", "5"),
    ] {
      store.upsert(reference, content).unwrap();
    }

    let distinct: HashSet<String> = store
      .entries()
      .iter()
      .map(|e| normalize_reference(&e.reference))
      .collect();
    assert_eq!(distinct.len(), store.len());
    assert_eq!(store.len(), 3);
    assert_eq!(store.find("psalm 23").unwrap().content, "3");
  }

  #[test]
  fn test_remove_absent_is_noop() {
    let mut store = StudyStore::open(MemoryStore::new(), &[entry("a", "John 3:16", "X")]).unwrap();

    assert!(!store.remove("missing").unwrap());
    assert!(store.remove("a").unwrap());
    assert!(store.is_empty());
    assert!(!store.remove("a").unwrap());
  }

  #[test]
  fn test_mutations_write_through() {
    let kv = Arc::new(MemoryStore::new());
    let mut store = StudyStore::open(Arc::clone(&kv), &seed_entries()).unwrap();
    let saved = store.upsert("Romans 8:28", "all things").unwrap();
    store.remove("pre-psalm-23-1").unwrap();

    let reopened = StudyStore::open(Arc::clone(&kv), &[]).unwrap();
    assert_eq!(reopened.entries(), store.entries());
    assert_eq!(reopened.get(&saved.id), Some(&saved));
  }

  #[test]
  fn test_failed_write_leaves_memory_untouched() {
    let mut store = StudyStore::open(ReadOnlyStore, &[entry("a", "John 3:16", "X")]).unwrap();

    assert!(store.upsert("John 3:16", "changed").is_err());
    assert!(store.upsert("Psalm 23", "new").is_err());
    assert!(store.remove("a").is_err());

    assert_eq!(store.len(), 1);
    assert_eq!(store.find("john 3:16").unwrap().content, "X");
  }
}
