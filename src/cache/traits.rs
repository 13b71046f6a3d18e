//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Trait for values that identify one cacheable read.
///
/// Implementors turn a logical query (a resource, optionally with parameters)
/// into a stable string key. Distinct queries must never produce the same key.
pub trait QueryKey {
  /// Key under which the query result is stored.
  fn cache_key(&self) -> String;

  /// Human readable description for logs.
  fn description(&self) -> String;
}

impl QueryKey for str {
  fn cache_key(&self) -> String {
    self.to_string()
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

impl QueryKey for String {
  fn cache_key(&self) -> String {
    self.clone()
  }

  fn description(&self) -> String {
    self.clone()
  }
}

/// A value read back from the local store together with its write time.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry<T> {
  pub data: T,
  pub written_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(entry: CachedEntry<T>) -> Self {
    Self {
      data: entry.data,
      source: CacheSource::Cache,
      cached_at: Some(entry.written_at),
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source == CacheSource::Cache
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data served from the local store without a network call
  Cache,
}
