//! Offline-first scripture study cache.
//!
//! Explanations for scripture references are fetched from an AI text
//! service, saved explicitly for offline use, and refreshed in place when
//! connectivity allows. A bundled set of studies is available from the
//! first start without any network access. Songs can be looked up through
//! the same service while online and are kept for later.

pub mod app;
pub mod config;
pub mod connectivity;
pub mod explain;
pub mod favorites;
pub mod songs;
pub mod storage;
pub mod study;
pub mod task;

pub use app::App;
pub use config::Config;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use explain::{ExplanationFetcher, GeminiClient};
pub use songs::{Song, SongFetcher, SongSearch};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageKey};
pub use study::{Explanation, ExplanationSource, Resolution, StudyEntry, SyncOutcome};
