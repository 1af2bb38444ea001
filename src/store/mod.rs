//! Structured local store: versioned, key-indexed SQLite persistence for
//! cached restaurants and reviews, intercepted payloads, shell assets and
//! the deferred-write queue.
//!
//! The handle is opened once and shared for the process lifetime. Every
//! access is a short transaction scoped to one logical operation; handles
//! are never held across a network await.

pub mod schema;

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{DataError, Result};
use crate::types::{Restaurant, Review};

/// Confirmation state of a locally applied favorite flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteState {
  /// Applied locally, not yet acknowledged by the service
  Pending,
  /// Matches what the service last acknowledged
  Confirmed,
}

impl FavoriteState {
  fn as_str(self) -> &'static str {
    match self {
      FavoriteState::Pending => "pending",
      FavoriteState::Confirmed => "confirmed",
    }
  }

  fn parse(s: &str) -> Self {
    match s {
      "pending" => FavoriteState::Pending,
      _ => FavoriteState::Confirmed,
    }
  }
}

pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Open the store at the default location (or under `data_dir` if given),
  /// creating and upgrading the schema as needed.
  pub fn open(data_dir: Option<&Path>) -> Result<Self> {
    let path = match data_dir {
      Some(dir) => dir.join("data.db"),
      None => Self::default_path()?,
    };
    Self::open_at(&path)
  }

  /// Open the store at an explicit database path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        DataError::StoreUnavailable(format!("failed to create store directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      DataError::StoreUnavailable(format!("failed to open store at {}: {}", path.display(), e))
    })?;

    schema::migrate(&conn, schema::TARGET_VERSION)?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Ephemeral store, handy for tests and scratch sessions.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    schema::migrate(&conn, schema::TARGET_VERSION)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| DataError::StoreUnavailable("could not determine data directory".into()))?;

    Ok(data_dir.join("bitecache").join("data.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| DataError::StoreUnavailable(format!("lock poisoned: {}", e)))
  }

  // ===== Restaurants =====

  /// Cache a restaurant record, replacing any previous copy (last write
  /// wins, favorite state reset to confirmed).
  pub fn put_restaurant(&self, restaurant: &Restaurant) -> Result<()> {
    let conn = self.lock()?;
    let record = serde_json::to_string(restaurant)
      .map_err(|e| DataError::StoreUnavailable(format!("failed to serialize restaurant: {}", e)))?;

    conn.execute(
      "INSERT OR REPLACE INTO restaurants (id, record, fav_state) VALUES (?, ?, 'confirmed')",
      params![restaurant.id as i64, record],
    )?;

    Ok(())
  }

  /// Cache a batch of restaurant records in one transaction.
  pub fn put_restaurants(&self, restaurants: &[Restaurant]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction().map_err(DataError::from)?;

    for restaurant in restaurants {
      let record = serde_json::to_string(restaurant).map_err(|e| {
        DataError::StoreUnavailable(format!("failed to serialize restaurant: {}", e))
      })?;
      tx.execute(
        "INSERT OR REPLACE INTO restaurants (id, record, fav_state) VALUES (?, ?, 'confirmed')",
        params![restaurant.id as i64, record],
      )?;
    }

    tx.commit().map_err(DataError::from)
  }

  pub fn get_restaurant(&self, id: u64) -> Result<Option<Restaurant>> {
    let conn = self.lock()?;
    let record: Option<String> = conn
      .query_row("SELECT record FROM restaurants WHERE id = ?", params![id as i64], |row| row.get(0))
      .optional()?;

    match record {
      Some(json) => {
        let restaurant = serde_json::from_str(&json).map_err(|e| {
          DataError::StoreUnavailable(format!("corrupt restaurant record {}: {}", id, e))
        })?;
        Ok(Some(restaurant))
      }
      None => Ok(None),
    }
  }

  pub fn all_restaurants(&self) -> Result<Vec<Restaurant>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT record FROM restaurants ORDER BY id")?;

    let restaurants = stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .filter_map(|r| r.ok())
      .filter_map(|json| serde_json::from_str(&json).ok())
      .collect();

    Ok(restaurants)
  }

  /// Flip the favorite flag on the cached copy, recording its confirmation
  /// state. Returns the previous record so a failed write can roll back.
  /// A miss (restaurant not cached) returns `None` and writes nothing.
  pub fn set_favorite_local(
    &self,
    id: u64,
    is_favorite: bool,
    state: FavoriteState,
  ) -> Result<Option<Restaurant>> {
    let conn = self.lock()?;
    let record: Option<String> = conn
      .query_row("SELECT record FROM restaurants WHERE id = ?", params![id as i64], |row| row.get(0))
      .optional()?;

    let Some(json) = record else {
      return Ok(None);
    };

    let previous: Restaurant = serde_json::from_str(&json).map_err(|e| {
      DataError::StoreUnavailable(format!("corrupt restaurant record {}: {}", id, e))
    })?;

    let mut updated = previous.clone();
    updated.is_favorite = is_favorite;
    let updated_json = serde_json::to_string(&updated)
      .map_err(|e| DataError::StoreUnavailable(format!("failed to serialize restaurant: {}", e)))?;

    conn.execute(
      "UPDATE restaurants SET record = ?, fav_state = ? WHERE id = ?",
      params![updated_json, state.as_str(), id as i64],
    )?;

    Ok(Some(previous))
  }

  /// Mark a pending favorite flag as acknowledged by the service.
  pub fn confirm_favorite(&self, id: u64) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "UPDATE restaurants SET fav_state = 'confirmed' WHERE id = ?",
      params![id as i64],
    )?;
    Ok(())
  }

  pub fn favorite_state(&self, id: u64) -> Result<Option<FavoriteState>> {
    let conn = self.lock()?;
    let state: Option<String> = conn
      .query_row("SELECT fav_state FROM restaurants WHERE id = ?", params![id as i64], |row| row.get(0))
      .optional()?;

    Ok(state.map(|s| FavoriteState::parse(&s)))
  }

  // ===== Reviews =====

  /// Cache a review, replacing any previous copy with the same id.
  pub fn put_review(&self, review: &Review) -> Result<()> {
    let conn = self.lock()?;
    let record = serde_json::to_string(review)
      .map_err(|e| DataError::StoreUnavailable(format!("failed to serialize review: {}", e)))?;

    conn.execute(
      "INSERT OR REPLACE INTO reviews (id, restaurant_id, record) VALUES (?, ?, ?)",
      params![review.id as i64, review.restaurant_id as i64, record],
    )?;

    Ok(())
  }

  /// Cache a batch of reviews in one transaction.
  pub fn put_reviews(&self, reviews: &[Review]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction().map_err(DataError::from)?;

    for review in reviews {
      let record = serde_json::to_string(review)
        .map_err(|e| DataError::StoreUnavailable(format!("failed to serialize review: {}", e)))?;
      tx.execute(
        "INSERT OR REPLACE INTO reviews (id, restaurant_id, record) VALUES (?, ?, ?)",
        params![review.id as i64, review.restaurant_id as i64, record],
      )?;
    }

    tx.commit().map_err(DataError::from)
  }

  /// All cached reviews owned by one restaurant, via the secondary index.
  pub fn reviews_for_restaurant(&self, restaurant_id: u64) -> Result<Vec<Review>> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare("SELECT record FROM reviews WHERE restaurant_id = ? ORDER BY id")?;

    let reviews = stmt
      .query_map(params![restaurant_id as i64], |row| row.get::<_, String>(0))?
      .filter_map(|r| r.ok())
      .filter_map(|json| serde_json::from_str(&json).ok())
      .collect();

    Ok(reviews)
  }

  // ===== Intercepted API payloads =====

  pub fn get_payload(&self, key: &str) -> Result<Option<serde_json::Value>> {
    let conn = self.lock()?;
    let body: Option<String> = conn
      .query_row("SELECT body FROM payloads WHERE key = ?", params![key], |row| row.get(0))
      .optional()?;

    match body {
      Some(json) => {
        let value = serde_json::from_str(&json).map_err(|e| {
          DataError::StoreUnavailable(format!("corrupt payload for '{}': {}", key, e))
        })?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  pub fn put_payload(&self, key: &str, body: &serde_json::Value) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO payloads (key, body, cached_at) VALUES (?, ?, datetime('now'))",
      params![key, body.to_string()],
    )?;
    Ok(())
  }

  // ===== Shell assets =====

  pub fn install_asset(
    &self,
    cache_name: &str,
    path: &str,
    content_type: &str,
    body: &[u8],
  ) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO shell_assets (cache_name, path, content_type, body) VALUES (?, ?, ?, ?)",
      params![cache_name, path, content_type, body],
    )?;
    Ok(())
  }

  pub fn get_asset(&self, cache_name: &str, path: &str) -> Result<Option<(String, Vec<u8>)>> {
    let conn = self.lock()?;
    conn
      .query_row(
        "SELECT content_type, body FROM shell_assets WHERE cache_name = ? AND path = ?",
        params![cache_name, path],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(DataError::from)
  }

  /// Wholesale invalidation on version bump: drop every asset that belongs
  /// to a different (older) cache name.
  pub fn purge_other_caches(&self, keep: &str) -> Result<usize> {
    let conn = self.lock()?;
    let purged = conn.execute("DELETE FROM shell_assets WHERE cache_name != ?", params![keep])?;
    Ok(purged)
  }

  // ===== Deferred writes =====

  /// Append a serialized write to the queue. Returns its sequence number.
  pub fn enqueue_write(&self, record: &str) -> Result<i64> {
    let conn = self.lock()?;
    conn.execute("INSERT INTO pending_writes (record) VALUES (?)", params![record])?;
    Ok(conn.last_insert_rowid())
  }

  /// The oldest queued write, if any.
  pub fn oldest_write(&self) -> Result<Option<(i64, String)>> {
    let conn = self.lock()?;
    conn
      .query_row(
        "SELECT seq, record FROM pending_writes ORDER BY seq LIMIT 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(DataError::from)
  }

  /// Remove a queued write after its replay has been confirmed.
  pub fn remove_write(&self, seq: i64) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM pending_writes WHERE seq = ?", params![seq])?;
    Ok(())
  }

  pub fn pending_write_count(&self) -> Result<usize> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_writes", [], |row| row.get(0))?;
    Ok(count as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::LatLng;

  fn restaurant(id: u64, name: &str, cuisine: &str, neighborhood: &str) -> Restaurant {
    Restaurant {
      id,
      name: name.to_string(),
      neighborhood: neighborhood.to_string(),
      address: "1 Main St".to_string(),
      latlng: LatLng { lat: 40.7, lng: -73.9 },
      cuisine_type: cuisine.to_string(),
      photograph: Some(id.to_string()),
      is_favorite: false,
    }
  }

  fn review(id: u64, restaurant_id: u64) -> Review {
    Review {
      id,
      restaurant_id,
      name: "Ada".to_string(),
      rating: 4,
      comments: "good".to_string(),
      created_at: chrono::Utc::now(),
    }
  }

  #[test]
  fn put_restaurant_is_last_write_wins() {
    let store = Store::in_memory().unwrap();

    store.put_restaurant(&restaurant(1, "First", "Pizza", "Queens")).unwrap();
    store.put_restaurant(&restaurant(1, "Second", "Pizza", "Queens")).unwrap();

    let all = store.all_restaurants().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Second");
  }

  #[test]
  fn reviews_queryable_by_restaurant() {
    let store = Store::in_memory().unwrap();

    store.put_reviews(&[review(1, 5), review(2, 5), review(3, 7)]).unwrap();

    let for_five = store.reviews_for_restaurant(5).unwrap();
    assert_eq!(for_five.len(), 2);
    assert!(for_five.iter().all(|r| r.restaurant_id == 5));
    assert!(store.reviews_for_restaurant(99).unwrap().is_empty());
  }

  #[test]
  fn favorite_flip_records_pending_state_and_previous_copy() {
    let store = Store::in_memory().unwrap();
    store.put_restaurant(&restaurant(5, "Spot", "Thai", "Astoria")).unwrap();

    let previous = store
      .set_favorite_local(5, true, FavoriteState::Pending)
      .unwrap()
      .unwrap();
    assert!(!previous.is_favorite);

    assert!(store.get_restaurant(5).unwrap().unwrap().is_favorite);
    assert_eq!(store.favorite_state(5).unwrap(), Some(FavoriteState::Pending));

    store.confirm_favorite(5).unwrap();
    assert_eq!(store.favorite_state(5).unwrap(), Some(FavoriteState::Confirmed));
  }

  #[test]
  fn favorite_flip_on_uncached_restaurant_is_a_noop() {
    let store = Store::in_memory().unwrap();
    let previous = store.set_favorite_local(42, true, FavoriteState::Pending).unwrap();
    assert!(previous.is_none());
  }

  #[test]
  fn upgrade_from_v1_adds_reviews_without_losing_restaurants() {
    let conn = Connection::open_in_memory().unwrap();
    schema::migrate(&conn, 1).unwrap();

    // v1 store: restaurants exists, reviews does not.
    conn
      .execute(
        "INSERT INTO restaurants (id, record) VALUES (1, ?)",
        params![serde_json::to_string(&restaurant(1, "Old", "Pizza", "Queens")).unwrap()],
      )
      .unwrap();
    assert!(conn.prepare("SELECT id FROM reviews").is_err());

    schema::migrate(&conn, 2).unwrap();

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
    assert_eq!(version, 2);
    conn.prepare("SELECT id FROM reviews").unwrap();

    let kept: String = conn
      .query_row("SELECT record FROM restaurants WHERE id = 1", [], |row| row.get(0))
      .unwrap();
    let kept: Restaurant = serde_json::from_str(&kept).unwrap();
    assert_eq!(kept.name, "Old");
  }

  #[test]
  fn migration_is_idempotent_at_target() {
    let conn = Connection::open_in_memory().unwrap();
    schema::migrate(&conn, schema::TARGET_VERSION).unwrap();
    schema::migrate(&conn, schema::TARGET_VERSION).unwrap();

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
    assert_eq!(version, schema::TARGET_VERSION);
  }

  #[test]
  fn shell_assets_purge_drops_only_other_cache_names() {
    let store = Store::in_memory().unwrap();
    store.install_asset("shell-001", "/index.html", "text/html", b"old").unwrap();
    store.install_asset("shell-002", "/index.html", "text/html", b"new").unwrap();

    let purged = store.purge_other_caches("shell-002").unwrap();
    assert_eq!(purged, 1);
    assert!(store.get_asset("shell-001", "/index.html").unwrap().is_none());

    let (content_type, body) = store.get_asset("shell-002", "/index.html").unwrap().unwrap();
    assert_eq!(content_type, "text/html");
    assert_eq!(body, b"new");
  }

  #[test]
  fn queue_preserves_insertion_order() {
    let store = Store::in_memory().unwrap();
    store.enqueue_write("first").unwrap();
    store.enqueue_write("second").unwrap();

    let (seq, record) = store.oldest_write().unwrap().unwrap();
    assert_eq!(record, "first");

    store.remove_write(seq).unwrap();
    let (_, record) = store.oldest_write().unwrap().unwrap();
    assert_eq!(record, "second");
    assert_eq!(store.pending_write_count().unwrap(), 1);
  }

  #[test]
  fn reopening_reuses_existing_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.db");

    {
      let store = Store::open_at(&path).unwrap();
      store.put_restaurant(&restaurant(3, "Kept", "Sushi", "SoHo")).unwrap();
    }

    let store = Store::open_at(&path).unwrap();
    assert_eq!(store.get_restaurant(3).unwrap().unwrap().name, "Kept");
  }
}
