//! Cache storage traits and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::freshness;
use crate::net::{Request, Response, ResponseSource};

/// A response read back from a cache partition.
#[derive(Debug, Clone)]
pub struct StoredResponse {
  /// The cached response, marked as cache-sourced
  pub response: Response,
  /// When the response was written
  pub stored_at: DateTime<Utc>,
}

/// Request/response cache split into named partitions.
///
/// Entries are keyed by method + exact URL. Each individual call is atomic;
/// nothing spans more than one call.
pub trait CacheStorage: Send + Sync {
  /// Create the partition if it does not exist yet.
  fn open(&self, partition: &str) -> Result<()>;

  /// Store (or overwrite) the response for a request.
  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()>;

  /// Exact match within one partition.
  fn match_in(&self, partition: &str, request: &Request) -> Result<Option<StoredResponse>>;

  /// Exact match in any partition, most recently stored first.
  fn match_any(&self, request: &Request) -> Result<Option<StoredResponse>>;

  /// Names of all existing partitions.
  fn partitions(&self) -> Result<Vec<String>>;

  /// Drop a partition and everything in it. Returns whether it existed.
  fn delete_partition(&self, partition: &str) -> Result<bool>;

  /// Number of entries in a partition.
  fn entry_count(&self, partition: &str) -> Result<usize>;
}

/// Durable string key/value store for freshness timestamps.
pub trait FreshnessStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Write `value` unless the stored value is already greater or equal.
  /// Returns whether the value was written.
  fn set_if_newer(&self, key: &str, value: &str) -> Result<bool>;
}

/// SQLite-based storage for both the response cache and the freshness records.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the storage at the given path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Storage that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("quicklook").join("cache.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named cache partitions (one static and one API partition per generation)
CREATE TABLE IF NOT EXISTS cache_partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

-- Opaque responses keyed by method + exact URL
CREATE TABLE IF NOT EXISTS cached_responses (
    partition TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (partition, method, url)
);

CREATE INDEX IF NOT EXISTS idx_cached_responses_url
    ON cached_responses(method, url);

-- Last successful fetch timestamps
CREATE TABLE IF NOT EXISTS freshness (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

type ResponseRow = (u16, Option<String>, Vec<u8>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_stored(row: ResponseRow) -> Result<StoredResponse> {
  let (status, content_type, body, stored_at) = row;
  let status = StatusCode::from_u16(status)
    .map_err(|e| eyre!("Invalid cached status {}: {}", status, e))?;
  let stored_at = freshness::parse_timestamp(&stored_at)
    .ok_or_else(|| eyre!("Failed to parse stored_at '{}'", stored_at))?;

  Ok(StoredResponse {
    response: Response {
      status,
      content_type,
      body,
      source: ResponseSource::Cache,
    },
    stored_at,
  })
}

impl CacheStorage for SqliteStorage {
  fn open(&self, partition: &str) -> Result<()> {
    self
      .lock()?
      .execute(
        "INSERT OR IGNORE INTO cache_partitions (name, created_at) VALUES (?, ?)",
        params![partition, freshness::format_timestamp(Utc::now())],
      )
      .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;

    Ok(())
  }

  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let now = freshness::format_timestamp(Utc::now());

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_partitions (name, created_at) VALUES (?, ?)",
      params![partition, now],
    )
    .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;

    tx.execute(
      "INSERT OR REPLACE INTO cached_responses (partition, method, url, status, content_type, body, stored_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        partition,
        request.method().as_str(),
        request.url(),
        response.status.as_u16(),
        response.content_type,
        response.body,
        now
      ],
    )
    .map_err(|e| eyre!("Failed to store response for {}: {}", request.url(), e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn match_in(&self, partition: &str, request: &Request) -> Result<Option<StoredResponse>> {
    let conn = self.lock()?;

    let row = conn
      .query_row(
        "SELECT status, content_type, body, stored_at FROM cached_responses
         WHERE partition = ? AND method = ? AND url = ?",
        params![partition, request.method().as_str(), request.url()],
        read_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached response: {}", e))?;

    row.map(into_stored).transpose()
  }

  fn match_any(&self, request: &Request) -> Result<Option<StoredResponse>> {
    let conn = self.lock()?;

    let row = conn
      .query_row(
        "SELECT status, content_type, body, stored_at FROM cached_responses
         WHERE method = ? AND url = ?
         ORDER BY stored_at DESC
         LIMIT 1",
        params![request.method().as_str(), request.url()],
        read_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached response: {}", e))?;

    row.map(into_stored).transpose()
  }

  fn partitions(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_partitions ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?;

    Ok(names)
  }

  fn delete_partition(&self, partition: &str) -> Result<bool> {
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cached_responses WHERE partition = ?",
      params![partition],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", partition, e))?;

    let removed = tx
      .execute(
        "DELETE FROM cache_partitions WHERE name = ?",
        params![partition],
      )
      .map_err(|e| eyre!("Failed to delete partition {}: {}", partition, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn entry_count(&self, partition: &str) -> Result<usize> {
    let conn = self.lock()?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cached_responses WHERE partition = ?",
        params![partition],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of {}: {}", partition, e))?;

    Ok(count as usize)
  }
}

impl FreshnessStore for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT value FROM freshness WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read freshness record {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self
      .lock()?
      .execute(
        "INSERT OR REPLACE INTO freshness (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write freshness record {}: {}", key, e))?;

    Ok(())
  }

  fn set_if_newer(&self, key: &str, value: &str) -> Result<bool> {
    let changed = self
      .lock()?
      .execute(
        "INSERT INTO freshness (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value
         WHERE excluded.value > freshness.value",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write freshness record {}: {}", key, e))?;

    Ok(changed > 0)
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;

  /// Storage that serves reads from an in-memory database but refuses every write.
  pub struct ReadOnlyStorage(SqliteStorage);

  impl ReadOnlyStorage {
    pub fn new() -> Self {
      Self(SqliteStorage::open_in_memory().unwrap())
    }
  }

  fn refused() -> color_eyre::Report {
    eyre!("Failed to write: storage is read-only")
  }

  impl CacheStorage for ReadOnlyStorage {
    fn open(&self, _partition: &str) -> Result<()> {
      Err(refused())
    }

    fn put(&self, _partition: &str, _request: &Request, _response: &Response) -> Result<()> {
      Err(refused())
    }

    fn match_in(&self, partition: &str, request: &Request) -> Result<Option<StoredResponse>> {
      self.0.match_in(partition, request)
    }

    fn match_any(&self, request: &Request) -> Result<Option<StoredResponse>> {
      self.0.match_any(request)
    }

    fn partitions(&self) -> Result<Vec<String>> {
      self.0.partitions()
    }

    fn delete_partition(&self, _partition: &str) -> Result<bool> {
      Err(refused())
    }

    fn entry_count(&self, partition: &str) -> Result<usize> {
      self.0.entry_count(partition)
    }
  }

  impl FreshnessStore for ReadOnlyStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
      self.0.get(key)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
      Err(refused())
    }

    fn set_if_newer(&self, _key: &str, _value: &str) -> Result<bool> {
      Err(refused())
    }
  }
}
