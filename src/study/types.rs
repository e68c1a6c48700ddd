//! Core types for saved studies and resolution outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a reference for lookups.
///
/// Case-folds only. Whitespace is significant, so "John 3:16" and
/// "John  3:16" are different references.
pub fn normalize_reference(reference: &str) -> String {
  reference.to_lowercase()
}

/// A cached explanation for one scripture reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyEntry {
  pub id: String,
  pub reference: String,
  pub content: String,
  /// Time of the fetch that produced `content`
  #[serde(
    rename = "timestamp",
    alias = "updatedAt",
    with = "chrono::serde::ts_milliseconds"
  )]
  pub updated_at: DateTime<Utc>,
}

impl StudyEntry {
  /// Whether this entry answers lookups for `reference`.
  pub fn matches(&self, reference: &str) -> bool {
    normalize_reference(&self.reference) == normalize_reference(reference)
  }
}

/// Explanation content handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
  /// Reference as requested (network) or as stored (cache)
  pub reference: String,
  pub content: String,
  /// Where the content came from
  pub source: ExplanationSource,
  /// When the cached content was fetched (cache sources only)
  pub updated_at: Option<DateTime<Utc>>,
}

impl Explanation {
  pub fn from_network(reference: &str, content: String) -> Self {
    Self {
      reference: reference.to_string(),
      content,
      source: ExplanationSource::Network,
      updated_at: None,
    }
  }

  pub fn offline(entry: StudyEntry) -> Self {
    Self::from_entry(entry, ExplanationSource::Offline)
  }

  pub fn degraded(entry: StudyEntry) -> Self {
    Self::from_entry(entry, ExplanationSource::Degraded)
  }

  fn from_entry(entry: StudyEntry, source: ExplanationSource) -> Self {
    Self {
      reference: entry.reference,
      content: entry.content,
      source,
      updated_at: Some(entry.updated_at),
    }
  }
}

/// Indicates where explanation content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationSource {
  /// Fresh content from the explanation service
  Network,
  /// Offline, serving the saved entry
  Offline,
  /// Online fetch failed, serving the saved entry (possibly stale)
  Degraded,
}

/// Outcome of resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Resolved(Explanation),
  /// Offline with nothing saved for the reference
  UnavailableOffline,
  /// Online fetch failed with nothing saved to fall back on
  Failed,
}

impl Resolution {
  pub fn content(&self) -> Option<&str> {
    match self {
      Self::Resolved(explanation) => Some(&explanation.content),
      _ => None,
    }
  }

  pub fn explanation(&self) -> Option<&Explanation> {
    match self {
      Self::Resolved(explanation) => Some(explanation),
      _ => None,
    }
  }

  /// True when cached content is shown because a fresh fetch failed.
  pub fn is_degraded(&self) -> bool {
    matches!(
      self,
      Self::Resolved(Explanation {
        source: ExplanationSource::Degraded,
        ..
      })
    )
  }
}

/// Outcome of a sync request for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Content refreshed in place
  Synced(StudyEntry),
  /// Rejected, no connectivity
  Offline,
  /// No entry with that id (or it was deleted mid-sync)
  NotFound,
  /// Rejected, a sync for the same entry is already running
  InFlight,
  /// Fetch failed, entry left untouched
  Failed,
}

impl SyncOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Synced(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_preserves_whitespace() {
    assert_eq!(normalize_reference("John 3:16"), "john 3:16");
    assert_ne!(
      normalize_reference("John 3:16"),
      normalize_reference("John  3:16")
    );
  }

  #[test]
  fn test_entry_reads_stored_format() {
    let raw = r#"{"id":"study-1","reference":"Psalm 23","content":"Shepherd","timestamp":1700000000000}"#;
    let entry: StudyEntry = serde_json::from_str(raw).unwrap();
    assert_eq!(entry.updated_at.timestamp(), 1_700_000_000);
    assert!(entry.matches("PSALM 23"));

    let written = serde_json::to_value(&entry).unwrap();
    assert_eq!(written["timestamp"], 1_700_000_000_000i64);
  }

  #[test]
  fn test_degraded_flag() {
    let entry = StudyEntry {
      id: "a".into(),
      reference: "Romans 8:28".into(),
      content: "Y".into(),
      updated_at: Utc::now(),
    };
    assert!(Resolution::Resolved(Explanation::degraded(entry.clone())).is_degraded());
    assert!(!Resolution::Resolved(Explanation::offline(entry)).is_degraded());
    assert_eq!(Resolution::Failed.content(), None);
  }
}
