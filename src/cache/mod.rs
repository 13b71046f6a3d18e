//! Generic caching layer for data persistence between sessions.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Persists JSON values in a local SQLite store keyed by namespace + key
//! - Migrates the store layout destructively on schema version changes
//! - Serves reads from the store until explicitly invalidated or force-refreshed
//! - Degrades to plain cache misses when the store cannot be opened

mod layer;
mod local;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use local::{last_sync_key, LocalCache, StoreLocation, CACHE_NAMESPACE, LAST_SYNC_PREFIX};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage, StoredEntry, SCHEMA_VERSION};
pub use traits::{CacheResult, CacheSource, CachedEntry, QueryKey};
