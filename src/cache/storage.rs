//! Persistence collaborator trait and SQLite implementation.
//!
//! The cache itself never touches disk. A caller saves detail states it has
//! read from the cache and seeds a fresh cache at startup with
//! [`PersistenceStore::load_update`].

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::state::ContentPersistableState;
use super::update::CacheUpdate;

/// A persisted listing: the ordered ids a repository tracked, its total,
/// and the last page it loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedListing {
  pub ids: Vec<i64>,
  pub total: usize,
  pub page: u32,
  pub cached_at: DateTime<Utc>,
}

/// Trait for persistence backends.
pub trait PersistenceStore: Send + Sync {
  /// Store the given detail views, replacing earlier ones of the same content.
  fn save_states(&self, states: &[ContentPersistableState]) -> Result<()>;

  /// Everything persisted, as a batch ready for `DataCache::merge`.
  fn load_update(&self) -> Result<CacheUpdate>;

  /// Replace the listing stored under `key`.
  fn store_listing(&self, key: &str, ids: &[i64], total: usize, page: u32) -> Result<()>;

  fn load_listing(&self, key: &str) -> Result<Option<CachedListing>>;
}

/// Store that keeps nothing. Used when persistence is disabled.
pub struct NoopStore;

impl PersistenceStore for NoopStore {
  fn save_states(&self, _states: &[ContentPersistableState]) -> Result<()> {
    Ok(())
  }

  fn load_update(&self) -> Result<CacheUpdate> {
    Ok(CacheUpdate::default())
  }

  fn store_listing(&self, _key: &str, _ids: &[i64], _total: usize, _page: u32) -> Result<()> {
    Ok(())
  }

  fn load_listing(&self, _key: &str) -> Result<Option<CachedListing>> {
    Ok(None)
  }
}

/// SQLite-based persistence.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open storage database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("emitron").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

const STORAGE_SCHEMA: &str = r#"
-- Detail views of contents (serialized JSON)
CREATE TABLE IF NOT EXISTS content_states (
    content_id INTEGER PRIMARY KEY,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Listings tracked by repositories
CREATE TABLE IF NOT EXISTS listing_cache (
    listing_key TEXT PRIMARY KEY,
    total INTEGER NOT NULL,
    page INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS listing_results (
    listing_key TEXT NOT NULL,
    content_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (listing_key, content_id),
    FOREIGN KEY (listing_key) REFERENCES listing_cache(listing_key) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_listing_results_key ON listing_results(listing_key);
"#;

impl PersistenceStore for SqliteStore {
  fn save_states(&self, states: &[ContentPersistableState]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for state in states {
      let content_id = state.content.id;
      let data =
        serde_json::to_vec(state).map_err(|e| eyre!("Failed to serialize content {}: {}", content_id, e))?;
      tx.execute(
        "INSERT OR REPLACE INTO content_states (content_id, data, cached_at)
         VALUES (?, ?, datetime('now'))",
        params![content_id, data],
      )
      .map_err(|e| eyre!("Failed to store content {}: {}", content_id, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    debug!("Persisted {} content states", states.len());
    Ok(())
  }

  fn load_update(&self) -> Result<CacheUpdate> {
    let conn = self.lock()?;

    // Oldest first, so the newest copy of a shared entity is merged last
    let mut stmt = conn
      .prepare("SELECT content_id, data FROM content_states ORDER BY cached_at, content_id")
      .map_err(|e| eyre!("Failed to prepare state query: {}", e))?;
    let rows: Vec<(i64, Vec<u8>)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to query states: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read state row: {}", e))?;

    let mut update = CacheUpdate::default();
    let mut loaded = 0;
    for (content_id, data) in rows {
      match serde_json::from_slice::<ContentPersistableState>(&data) {
        Ok(state) => {
          update = update.merged_with(CacheUpdate::from(state));
          loaded += 1;
        }
        Err(e) => warn!("Skipping unreadable state of content {}: {}", content_id, e),
      }
    }

    debug!("Loaded {} persisted content states", loaded);
    Ok(update)
  }

  fn store_listing(&self, key: &str, ids: &[i64], total: usize, page: u32) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM listing_results WHERE listing_key = ?",
      params![key],
    )
    .map_err(|e| eyre!("Failed to delete old listing results: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO listing_cache (listing_key, total, page, cached_at, result_count)
       VALUES (?, ?, ?, datetime('now'), ?)",
      params![key, total as i64, page, ids.len() as i64],
    )
    .map_err(|e| eyre!("Failed to update listing cache: {}", e))?;

    for (position, id) in ids.iter().enumerate() {
      tx.execute(
        "INSERT OR REPLACE INTO listing_results (listing_key, content_id, position)
         VALUES (?, ?, ?)",
        params![key, id, position as i64],
      )
      .map_err(|e| eyre!("Failed to store listing result: {}", e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn load_listing(&self, key: &str) -> Result<Option<CachedListing>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT total, page, cached_at FROM listing_cache WHERE listing_key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;
    let info: Option<(i64, u32, String)> = stmt
      .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .optional()
      .map_err(|e| eyre!("Failed to read listing {}: {}", key, e))?;

    let (total, page, cached_at) = match info {
      Some(info) => info,
      None => return Ok(None),
    };

    let mut stmt = conn
      .prepare("SELECT content_id FROM listing_results WHERE listing_key = ? ORDER BY position")
      .map_err(|e| eyre!("Failed to prepare listing query: {}", e))?;
    let ids: Vec<i64> = stmt
      .query_map(params![key], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query listing: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read listing row: {}", e))?;

    Ok(Some(CachedListing {
      ids,
      total: usize::try_from(total).unwrap_or_default(),
      page,
      cached_at: parse_datetime(&cached_at)?,
    }))
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_support::{collection_document, screencast_document, update_from};
  use crate::cache::DataCache;

  #[test]
  fn test_states_seed_a_fresh_cache() {
    let cache = DataCache::new();
    cache.merge(&update_from(collection_document()));
    let states = vec![
      cache.cached_content_persistable_state(10).unwrap(),
      cache.cached_content_persistable_state(11).unwrap(),
    ];

    let store = SqliteStore::open_in_memory().unwrap();
    store.save_states(&states).unwrap();

    let restored = DataCache::new();
    restored.merge(&store.load_update().unwrap());

    assert_eq!(
      restored.cached_content_persistable_state(10).unwrap(),
      states[0]
    );
    assert_eq!(
      restored.cached_content_persistable_state(11).unwrap(),
      states[1]
    );
  }

  #[test]
  fn test_resaving_replaces_state() {
    let cache = DataCache::new();
    cache.merge(&update_from(screencast_document(42)));
    let mut state = cache.cached_content_persistable_state(42).unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    store.save_states(std::slice::from_ref(&state)).unwrap();
    state.content_domains.clear();
    state.domains.clear();
    store.save_states(&[state]).unwrap();

    let update = store.load_update().unwrap();
    assert_eq!(update.contents().len(), 1);
    assert!(update.content_domains().is_empty());
    assert!(update.domains().is_empty());
  }

  #[test]
  fn test_unreadable_state_is_skipped() {
    let cache = DataCache::new();
    cache.merge(&update_from(screencast_document(1)));
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .save_states(&[cache.cached_content_persistable_state(1).unwrap()])
      .unwrap();
    store
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO content_states (content_id, data) VALUES (2, ?)",
        params![b"{not json".to_vec()],
      )
      .unwrap();

    let update = store.load_update().unwrap();
    let ids: Vec<i64> = update.contents().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1]);
  }

  #[test]
  fn test_listing() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.load_listing("abc").unwrap().is_none());

    store.store_listing("abc", &[3, 1, 2], 30, 1).unwrap();
    store.store_listing("abc", &[3, 1, 2, 9], 31, 2).unwrap();

    let listing = store.load_listing("abc").unwrap().unwrap();
    assert_eq!(listing.ids, vec![3, 1, 2, 9]);
    assert_eq!(listing.total, 31);
    assert_eq!(listing.page, 2);
  }

  #[test]
  fn test_listing_storage_fault_is_an_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO listing_cache (listing_key, total, page, result_count)
         VALUES ('abc', 3, 'not a page', 0)",
        [],
      )
      .unwrap();

    assert!(store.load_listing("abc").is_err());
  }

  #[test]
  fn test_noop_store() {
    let store = NoopStore;
    store.store_listing("abc", &[1], 1, 1).unwrap();
    assert!(store.load_listing("abc").unwrap().is_none());
    assert!(store.load_update().unwrap().is_empty());
  }
}
