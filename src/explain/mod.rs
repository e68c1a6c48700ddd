//! Explanation fetching from the external AI text service.

pub mod api_types;
mod client;

use std::future::Future;

pub use client::GeminiClient;

/// Source of fresh explanation content.
///
/// Every failure (network error, timeout, empty or malformed response)
/// comes back as `None`. Implementations do not retry.
pub trait ExplanationFetcher: Send + Sync {
  fn explain(&self, reference: &str) -> impl Future<Output = Option<String>> + Send;
}
