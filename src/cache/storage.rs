//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Current physical layout version, kept in `PRAGMA user_version`.
///
/// Version 1 had one table per resource. Version 2 keeps every entry in a
/// single generic table keyed by `(namespace, key)`.
pub const SCHEMA_VERSION: i32 = 2;

/// Raw entry as persisted by a storage backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
  /// Serialized JSON value
  pub data: Vec<u8>,
  /// When the entry was written
  pub written_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Every method is its own unit of work; nothing spans calls.
pub trait CacheStorage: Send + Sync {
  /// Read one entry.
  fn get(&self, namespace: &str, key: &str) -> Result<Option<StoredEntry>>;

  /// Insert or fully replace one entry.
  fn put(&self, namespace: &str, key: &str, data: &[u8], written_at: DateTime<Utc>) -> Result<()>;

  /// Delete one entry. Deleting a missing key is not an error.
  fn delete(&self, namespace: &str, key: &str) -> Result<()>;

  /// Delete every entry in a namespace.
  fn clear_namespace(&self, namespace: &str) -> Result<()>;

  /// Delete every entry.
  fn clear_all(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _namespace: &str, _key: &str) -> Result<Option<StoredEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _namespace: &str, _key: &str, _data: &[u8], _at: DateTime<Utc>) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete(&self, _namespace: &str, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear_namespace(&self, _namespace: &str) -> Result<()> {
    Ok(())
  }

  fn clear_all(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`, migrating its layout if needed.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database. Contents vanish with the value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Bring the physical layout to [`SCHEMA_VERSION`].
  ///
  /// A version change drops every existing table before creating the generic
  /// one. Cached values are disposable, so nothing is copied across.
  fn run_migrations(&self) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let version: i32 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read cache schema version: {}", e))?;

    if version == SCHEMA_VERSION {
      conn
        .execute_batch(CACHE_SCHEMA)
        .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
      return Ok(());
    }

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin migration: {}", e))?;

    let tables: Vec<String> = {
      let mut stmt = tx
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .map_err(|e| eyre!("Failed to list cache tables: {}", e))?;
      let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| eyre!("Failed to list cache tables: {}", e))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(|e| eyre!("Failed to list cache tables: {}", e))?;
      names
    };

    for table in &tables {
      tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{}\";",
        table.replace('"', "\"\"")
      ))
      .map_err(|e| eyre!("Failed to drop cache table {}: {}", table, e))?;
    }

    tx.execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
      .map_err(|e| eyre!("Failed to set cache schema version: {}", e))?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache migration: {}", e))?;

    info!(
      from = version,
      to = SCHEMA_VERSION,
      dropped = tables.len(),
      "Migrated cache store layout"
    );

    Ok(())
  }

  #[cfg(test)]
  fn schema_version(&self) -> i32 {
    let conn = self.conn.lock().unwrap();
    conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .unwrap()
  }

  #[cfg(test)]
  fn table_names(&self) -> Vec<String> {
    let conn = self.conn.lock().unwrap();
    let mut stmt = conn
      .prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
      )
      .unwrap();
    let names = stmt
      .query_map([], |row| row.get(0))
      .unwrap()
      .collect::<rusqlite::Result<Vec<String>>>()
      .unwrap();
    names
  }
}

/// Schema for the generic cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    data BLOB NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (namespace, key)
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, namespace: &str, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT data, timestamp FROM cache_entries WHERE namespace = ? AND key = ?",
        params![namespace, key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}/{}: {}", namespace, key, e))?;

    match row {
      Some((data, millis)) => Ok(Some(StoredEntry {
        data,
        written_at: parse_millis(millis)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, namespace: &str, key: &str, data: &[u8], written_at: DateTime<Utc>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (namespace, key, data, timestamp)
         VALUES (?, ?, ?, ?)",
        params![namespace, key, data, written_at.timestamp_millis()],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}/{}: {}", namespace, key, e))?;

    Ok(())
  }

  fn delete(&self, namespace: &str, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE namespace = ? AND key = ?",
        params![namespace, key],
      )
      .map_err(|e| eyre!("Failed to delete cache entry {}/{}: {}", namespace, key, e))?;

    Ok(())
  }

  fn clear_namespace(&self, namespace: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE namespace = ?",
        params![namespace],
      )
      .map_err(|e| eyre!("Failed to clear cache namespace {}: {}", namespace, e))?;

    Ok(())
  }

  fn clear_all(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Convert stored epoch milliseconds back to a UTC timestamp.
fn parse_millis(millis: i64) -> Result<DateTime<Utc>> {
  Utc
    .timestamp_millis_opt(millis)
    .single()
    .ok_or_else(|| eyre!("Invalid cache timestamp {}", millis))
}
