//! Lazily opened local cache that never blocks a caller on storage failures.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use super::storage::{CacheStorage, NoopStorage, SqliteStorage};
use super::traits::CachedEntry;

/// Namespace holding every resource entry and last-sync marker.
pub const CACHE_NAMESPACE: &str = "cache";

/// Key prefix reserved for last-sync markers.
pub const LAST_SYNC_PREFIX: &str = "__last_sync__";

/// Where the local store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
  /// SQLite database file
  File(PathBuf),
  /// Private in-memory SQLite database
  Memory,
  /// Caching disabled, every read misses
  Disabled,
}

impl StoreLocation {
  fn open(&self) -> Result<Arc<dyn CacheStorage>> {
    Ok(match self {
      Self::File(path) => Arc::new(SqliteStorage::open(path)?),
      Self::Memory => Arc::new(SqliteStorage::open_in_memory()?),
      Self::Disabled => Arc::new(NoopStorage),
    })
  }
}

#[derive(Serialize, Deserialize)]
struct SyncMarker {
  #[serde(with = "chrono::serde::ts_milliseconds")]
  timestamp: DateTime<Utc>,
}

/// Outcome of the one-time open, shared by every clone.
enum StoreState {
  Ready(Arc<dyn CacheStorage>),
  Unavailable(String),
  Disposed,
}

/// Durable key-value cache over a [`CacheStorage`] backend.
///
/// The backend is opened on first use. Concurrent first callers wait on the
/// same open instead of racing. If the open fails, the failure is remembered
/// and the cache behaves as permanently empty for the rest of the session.
///
/// Reads return `None` on miss, on undecodable data and on storage errors.
/// Writes are best effort: failures are logged and dropped.
#[derive(Clone)]
pub struct LocalCache {
  location: StoreLocation,
  state: Arc<OnceCell<RwLock<StoreState>>>,
}

impl LocalCache {
  /// Create a cache for `location`. Nothing is opened until first use.
  pub fn new(location: StoreLocation) -> Self {
    Self {
      location,
      state: Arc::new(OnceCell::new()),
    }
  }

  /// Convenience constructor for an isolated in-memory cache.
  pub fn in_memory() -> Self {
    Self::new(StoreLocation::Memory)
  }

  /// Open the underlying store if that has not happened yet.
  ///
  /// Idempotent. Returns an error when the store could not be opened (now or
  /// on an earlier call); callers treat that exactly like a cache miss.
  pub async fn initialize(&self) -> Result<()> {
    let state = self.state().await.read().await;
    match &*state {
      StoreState::Ready(_) => Ok(()),
      StoreState::Unavailable(reason) => Err(eyre!("Cache store unavailable: {}", reason)),
      StoreState::Disposed => Err(eyre!("Cache store has been disposed")),
    }
  }

  /// Whether the store opened successfully and has not been disposed.
  pub async fn is_available(&self) -> bool {
    self.initialize().await.is_ok()
  }

  /// Release the underlying store. Later operations behave as misses.
  pub async fn dispose(&self) {
    let mut state = self.state().await.write().await;
    *state = StoreState::Disposed;
    debug!("Cache store disposed");
  }

  async fn state(&self) -> &RwLock<StoreState> {
    self
      .state
      .get_or_init(|| async {
        let state = match self.location.open() {
          Ok(storage) => {
            debug!(location = ?self.location, "Cache store opened");
            StoreState::Ready(storage)
          }
          Err(e) => {
            warn!(location = ?self.location, error = %e, "Cache store unavailable, continuing without cache");
            StoreState::Unavailable(e.to_string())
          }
        };
        RwLock::new(state)
      })
      .await
  }

  async fn storage(&self) -> Option<Arc<dyn CacheStorage>> {
    match &*self.state().await.read().await {
      StoreState::Ready(storage) => Some(Arc::clone(storage)),
      _ => None,
    }
  }

  /// Read a value. `None` on miss, corruption or unavailable storage.
  pub async fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
    self.get_entry(namespace, key).await.map(|entry| entry.data)
  }

  /// Read a value together with the time it was written.
  pub async fn get_entry<T: DeserializeOwned>(
    &self,
    namespace: &str,
    key: &str,
  ) -> Option<CachedEntry<T>> {
    let storage = self.storage().await?;

    let stored = match storage.get(namespace, key) {
      Ok(Some(stored)) => stored,
      Ok(None) => {
        debug!(namespace, key, "Cache MISS");
        return None;
      }
      Err(e) => {
        warn!(namespace, key, error = %e, "Cache read failed");
        return None;
      }
    };

    match serde_json::from_slice(&stored.data) {
      Ok(data) => {
        debug!(namespace, key, "Cache HIT");
        Some(CachedEntry {
          data,
          written_at: stored.written_at,
        })
      }
      Err(e) => {
        debug!(namespace, key, error = %e, "Discarding undecodable cache entry");
        None
      }
    }
  }

  /// Insert or replace a value, stamping the current time.
  pub async fn set<T: Serialize + ?Sized>(&self, namespace: &str, key: &str, value: &T) {
    let Some(storage) = self.storage().await else {
      return;
    };

    let data = match serde_json::to_vec(value) {
      Ok(data) => data,
      Err(e) => {
        warn!(namespace, key, error = %e, "Failed to serialize cache value");
        return;
      }
    };

    if let Err(e) = storage.put(namespace, key, &data, Utc::now()) {
      warn!(namespace, key, error = %e, "Cache write dropped");
    } else {
      debug!(namespace, key, bytes = data.len(), "Cache SET");
    }
  }

  /// Delete one entry. Missing entries are ignored.
  pub async fn remove(&self, namespace: &str, key: &str) {
    let Some(storage) = self.storage().await else {
      return;
    };

    if let Err(e) = storage.delete(namespace, key) {
      warn!(namespace, key, error = %e, "Cache delete dropped");
    } else {
      debug!(namespace, key, "Cache DELETE");
    }
  }

  /// Delete every entry under one namespace.
  pub async fn clear_namespace(&self, namespace: &str) {
    let Some(storage) = self.storage().await else {
      return;
    };

    if let Err(e) = storage.clear_namespace(namespace) {
      warn!(namespace, error = %e, "Cache namespace clear dropped");
    }
  }

  /// Delete every cached entry, last-sync markers included.
  pub async fn clear_all(&self) {
    let Some(storage) = self.storage().await else {
      return;
    };

    match storage.clear_all() {
      Ok(()) => warn!("Cache CLEAR_ALL executed - all cached data removed"),
      Err(e) => warn!(error = %e, "Cache clear dropped"),
    }
  }

  /// When `resource` was last fetched fresh from the network.
  pub async fn get_last_sync_time(&self, resource: &str) -> Option<DateTime<Utc>> {
    self
      .get::<SyncMarker>(CACHE_NAMESPACE, &last_sync_key(resource))
      .await
      .map(|marker| marker.timestamp)
  }

  /// Record that `resource` was just fetched fresh.
  pub async fn set_last_sync_time(&self, resource: &str) {
    let marker = SyncMarker {
      timestamp: Utc::now(),
    };
    self
      .set(CACHE_NAMESPACE, &last_sync_key(resource), &marker)
      .await;
  }
}

/// Reserved key holding the last-sync marker of `resource`.
pub fn last_sync_key(resource: &str) -> String {
  format!("{}{}", LAST_SYNC_PREFIX, resource)
}
