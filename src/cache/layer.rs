//! Cache layer that orchestrates caching logic with network fetching.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tracing::{debug, info};

use super::local::{LocalCache, CACHE_NAMESPACE};
use super::traits::{CacheResult, QueryKey};

/// Read-through cache with an explicit bypass.
///
/// Entries never expire on their own. They are replaced by a forced fetch and
/// removed by [`CacheLayer::invalidate`] or a global clear.
///
/// Concurrent misses on the same key are not coalesced: each caller fetches
/// and writes, and the last write wins.
#[derive(Clone)]
pub struct CacheLayer {
  cache: LocalCache,
}

impl CacheLayer {
  /// Create a new cache layer over the given local cache.
  pub fn new(cache: LocalCache) -> Self {
    Self { cache }
  }

  pub fn local(&self) -> &LocalCache {
    &self.cache
  }

  /// Return the cached value for `key`, or fetch, store and return it.
  ///
  /// 1. Unless `force` is set, return a cached value without any network call
  /// 2. Otherwise fetch from network
  /// 3. On success store the value and stamp the last-sync time of `resource`
  /// 4. On failure return the error and leave the cache untouched
  pub async fn fetch<K, T, E, F, Fut>(
    &self,
    key: &K,
    resource: &str,
    force: bool,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let cache_key = key.cache_key();

    if !force {
      if let Some(entry) = self.cache.get_entry::<T>(CACHE_NAMESPACE, &cache_key).await {
        return Ok(CacheResult::from_cache(entry));
      }
    } else {
      debug!(query = %key.description(), "Forced refresh, bypassing cache");
    }

    let data = fetcher().await?;

    self.cache.set(CACHE_NAMESPACE, &cache_key, &data).await;
    self.cache.set_last_sync_time(resource).await;
    info!(resource, query = %key.description(), "Fetched fresh data");

    Ok(CacheResult::from_network(data))
  }

  /// Remove each key so the next read goes to the network.
  pub async fn invalidate<K: AsRef<str>>(&self, keys: &[K]) {
    for key in keys {
      self.cache.remove(CACHE_NAMESPACE, key.as_ref()).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  async fn counted(
    calls: &AtomicUsize,
    value: Vec<u32>,
  ) -> Result<Vec<u32>, String> {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(value)
  }

  #[tokio::test]
  async fn test_miss_fetches_once_then_hits() {
    let layer = CacheLayer::new(LocalCache::in_memory());
    let calls = AtomicUsize::new(0);

    let first = layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![1, 2]))
      .await
      .unwrap();
    assert!(!first.is_from_cache());
    assert_eq!(first.data, vec![1, 2]);

    let second = layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![9]))
      .await
      .unwrap();
    assert!(second.is_from_cache());
    assert!(second.cached_at.is_some());
    assert_eq!(second.data, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_force_bypasses_and_overwrites() {
    let layer = CacheLayer::new(LocalCache::in_memory());
    let calls = AtomicUsize::new(0);

    layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![1]))
      .await
      .unwrap();
    let forced = layer
      .fetch("numbers_list", "numbers", true, || counted(&calls, vec![2]))
      .await
      .unwrap();

    assert_eq!(forced.data, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let cached: Option<Vec<u32>> = layer.local().get(CACHE_NAMESPACE, "numbers_list").await;
    assert_eq!(cached, Some(vec![2]));
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_cache_untouched() {
    let layer = CacheLayer::new(LocalCache::in_memory());

    let result: Result<CacheResult<Vec<u32>>, String> = layer
      .fetch("numbers_list", "numbers", false, || async {
        Err("Request failed".to_string())
      })
      .await;

    assert_eq!(result.unwrap_err(), "Request failed");
    let cached: Option<Vec<u32>> = layer.local().get(CACHE_NAMESPACE, "numbers_list").await;
    assert!(cached.is_none());
    assert!(layer.local().get_last_sync_time("numbers").await.is_none());
  }

  #[tokio::test]
  async fn test_failed_forced_fetch_keeps_previous_value() {
    let layer = CacheLayer::new(LocalCache::in_memory());
    let calls = AtomicUsize::new(0);
    layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![1]))
      .await
      .unwrap();

    let result: Result<CacheResult<Vec<u32>>, String> = layer
      .fetch("numbers_list", "numbers", true, || async { Err("down".to_string()) })
      .await;

    assert!(result.is_err());
    let cached: Option<Vec<u32>> = layer.local().get(CACHE_NAMESPACE, "numbers_list").await;
    assert_eq!(cached, Some(vec![1]));
  }

  #[tokio::test]
  async fn test_fresh_fetch_stamps_last_sync() {
    let layer = CacheLayer::new(LocalCache::in_memory());
    let calls = AtomicUsize::new(0);
    let before = chrono::Utc::now();

    layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![1]))
      .await
      .unwrap();

    let stamped = layer.local().get_last_sync_time("numbers").await.unwrap();
    assert!(stamped.timestamp_millis() >= before.timestamp_millis());
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let layer = CacheLayer::new(LocalCache::in_memory());
    let calls = AtomicUsize::new(0);

    layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![1]))
      .await
      .unwrap();
    layer.invalidate(&["numbers_list"]).await;
    let again = layer
      .fetch("numbers_list", "numbers", false, || counted(&calls, vec![3]))
      .await
      .unwrap();

    assert!(!again.is_from_cache());
    assert_eq!(again.data, vec![3]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
