//! Explanations bundled with the application.

use chrono::{DateTime, Utc};

use super::types::StudyEntry;

/// A pre-cached study available without network access.
#[derive(Debug, Clone, Copy)]
pub struct SeedStudy {
  pub id: &'static str,
  pub reference: &'static str,
  pub content: &'static str,
}

/// Timestamp of the bundled dataset (2024-12-25T00:00:00Z).
const BUNDLED_AT_SECS: i64 = 1_735_084_800;

/// Bundled dataset.
pub const PRE_CACHED_STUDIES: &[SeedStudy] = &[
  SeedStudy {
    id: "pre-john-3-16",
    reference: "John 3:16",
    content: "God's love is shown in the gift of His Son. Whoever believes in Him \
              does not perish but receives eternal life. The verse summarises the \
              whole gospel: the source is God's love, the means is the Son, the \
              response is faith, and the result is life.",
  },
  SeedStudy {
    id: "pre-psalm-23-1",
    reference: "Psalm 23:1",
    content: "David pictures the Lord as a shepherd who guides, feeds and protects \
              His flock. Because the shepherd provides, the sheep lacks nothing it \
              truly needs.",
  },
  SeedStudy {
    id: "pre-philippians-4-13",
    reference: "Philippians 4:13",
    content: "Paul writes from prison that he has learned contentment in plenty and \
              in need. His strength to face every circumstance comes from Christ, \
              not from his own resources.",
  },
  SeedStudy {
    id: "pre-jeremiah-29-11",
    reference: "Jeremiah 29:11",
    content: "Spoken to exiles in Babylon, the promise assures them that God's plans \
              are for their welfare and not for harm. Their hope rests on His \
              faithfulness through a long waiting.",
  },
  SeedStudy {
    id: "pre-isaiah-40-31",
    reference: "Isaiah 40:31",
    content: "Those who wait on the Lord receive renewed strength. The images of \
              eagles, running and walking describe endurance that God supplies to \
              the weary.",
  },
];

impl SeedStudy {
  pub fn to_entry(&self) -> StudyEntry {
    StudyEntry {
      id: self.id.to_string(),
      reference: self.reference.to_string(),
      content: self.content.to_string(),
      updated_at: DateTime::<Utc>::from_timestamp(BUNDLED_AT_SECS, 0).unwrap_or_default(),
    }
  }
}

/// The bundled dataset as store entries.
pub fn seed_entries() -> Vec<StudyEntry> {
  PRE_CACHED_STUDIES.iter().map(SeedStudy::to_entry).collect()
}
