//! Versioned schema for the structured local store.
//!
//! The on-disk version (`PRAGMA user_version`) only ever increases. Each
//! step creates exactly the objects introduced at that version, and opening
//! an older store applies every step above its version in order, so a store
//! at any historical version upgrades to the current layout without
//! touching existing rows.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const TARGET_VERSION: i64 = 3;

/// Additive migration steps, one per schema version.
const STEPS: &[(i64, &str)] = &[(1, V1), (2, V2), (3, V3)];

// v1: cached restaurant records keyed by id. `fav_state` tracks whether a
// locally applied favorite flag has been confirmed by the service.
const V1: &str = r#"
CREATE TABLE IF NOT EXISTS restaurants (
    id INTEGER PRIMARY KEY,
    record TEXT NOT NULL,
    fav_state TEXT NOT NULL DEFAULT 'confirmed'
);
"#;

// v2: cached reviews keyed by id, queryable by owning restaurant.
const V2: &str = r#"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    restaurant_id INTEGER NOT NULL,
    record TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reviews_restaurant ON reviews(restaurant_id);
"#;

// v3: intercepted API payloads, the versioned shell-asset cache, and the
// ordered deferred-write queue.
const V3: &str = r#"
CREATE TABLE IF NOT EXISTS payloads (
    key TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS shell_assets (
    cache_name TEXT NOT NULL,
    path TEXT NOT NULL,
    content_type TEXT NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (cache_name, path)
);

CREATE TABLE IF NOT EXISTS pending_writes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    record TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Upgrade `conn` to `target`, applying every step above the on-disk
/// version. A store already at or past `target` is left untouched.
pub fn migrate(conn: &Connection, target: i64) -> Result<()> {
  let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

  for (version, sql) in STEPS {
    if *version > current && *version <= target {
      conn.execute_batch(sql)?;
      conn.pragma_update(None, "user_version", version)?;
    }
  }

  Ok(())
}
