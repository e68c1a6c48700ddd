//! In-memory key-value storage.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{KeyValueStore, StorageKey};

/// Storage that keeps values for the lifetime of the process only.
/// Used for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: StorageKey) -> Result<Option<String>> {
    let values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(values.get(&key).cloned())
  }

  fn set(&self, key: StorageKey, value: &str) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.insert(key, value.to_string());
    Ok(())
  }
}
