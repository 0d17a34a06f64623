//! # Response Cache
//!
//! Short-lived cache of GET responses keyed by absolute request URL.
//! Entries expire after a fixed TTL and are never invalidated explicitly;
//! only exactly-200 responses are ever written.

use std::sync::LazyLock;
use std::time::Duration;

use moka::sync::Cache;

use crate::client::ApiResponse;
use crate::consts::CACHE_TTL_SECS;

const SIZE: u64 = 500;

/// Backing store shared by every client in the process. Clients are cheap
/// and short-lived; cached responses must outlive them.
static SHARED: LazyLock<Cache<String, ApiResponse>> = LazyLock::new(|| {
  Cache::builder()
    .max_capacity(SIZE)
    .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
    .build()
});

/// Process-wide cache of successful GET responses.
pub struct ResponseCache {
  cache: Cache<String, ApiResponse>,
}

impl ResponseCache {
  /// Handle onto the shared store. Moka caches clone as references, so
  /// every handle sees the same entries.
  pub fn new() -> Self {
    ResponseCache { cache: SHARED.clone() }
  }

  /// Private store with its own TTL, for expiry tests.
  pub(crate) fn with_ttl(ttl: Duration) -> Self {
    let cache = Cache::builder().max_capacity(SIZE).time_to_live(ttl).build();

    ResponseCache { cache }
  }

  pub fn get(&self, url: &str) -> Option<ApiResponse> {
    self.cache.get(url)
  }

  /// Store a response. Non-200 responses are dropped so a failed fetch is
  /// always retried on the next request.
  pub fn insert(&self, url: &str, response: &ApiResponse) {
    if response.is_ok() {
      self.cache.insert(url.to_string(), response.clone());
    }
  }
}

impl Default for ResponseCache {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use reqwest::StatusCode;
  use serde_json::json;

  use super::*;
  use crate::client::{ApiResponse, ResponseBody};

  fn response(status: StatusCode) -> ApiResponse {
    ApiResponse {
      status,
      body: ResponseBody::Json(json!({"ok": true})),
      error: None,
    }
  }

  #[test]
  fn test_only_200_responses_are_stored() {
    let cache = ResponseCache::new();

    cache.insert("https://jira.example.com/rest/api/2/priority", &response(StatusCode::OK));
    cache.insert("https://jira.example.com/rest/api/2/project", &response(StatusCode::BAD_GATEWAY));

    assert!(cache.get("https://jira.example.com/rest/api/2/priority").is_some());
    assert!(cache.get("https://jira.example.com/rest/api/2/project").is_none());
  }

  #[test]
  fn test_entries_expire_after_ttl() {
    let cache = ResponseCache::with_ttl(Duration::from_millis(40));

    cache.insert("https://jira.example.com/rest/api/2/priority", &response(StatusCode::OK));
    assert!(cache.get("https://jira.example.com/rest/api/2/priority").is_some());

    std::thread::sleep(Duration::from_millis(80));
    assert!(cache.get("https://jira.example.com/rest/api/2/priority").is_none());
  }

  #[test]
  fn test_handles_share_the_process_wide_store() {
    let writer = ResponseCache::new();
    let reader = ResponseCache::new();

    writer.insert(
      "https://jira.example.com/rest/api/2/project/SHR/versions",
      &response(StatusCode::OK),
    );

    assert!(reader.get("https://jira.example.com/rest/api/2/project/SHR/versions").is_some());
  }

  #[test]
  fn test_distinct_urls_do_not_share_entries() {
    let cache = ResponseCache::new();

    cache.insert("https://jira.example.com/rest/api/2/priority", &response(StatusCode::OK));

    assert!(cache.get("https://jira.example.com/rest/api/2/priority?x=1").is_none());
  }
}
