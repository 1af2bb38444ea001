//! Durable, ordered holding area for writes made while offline.
//!
//! Unlike a single-slot design, a second offline write queues behind the
//! first instead of overwriting it. Rows are replayed oldest-first on
//! reconnect and removed only after the service confirms the replay.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::store::Store;
use crate::types::NewReview;

/// A serialized pending mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeferredWrite {
  FavoriteUpdate { id: u64, is_favorite: bool },
  NewReview { review: NewReview },
}

#[derive(Clone)]
pub struct DeferredWriteQueue {
  store: Arc<Store>,
}

impl DeferredWriteQueue {
  pub fn new(store: Arc<Store>) -> Self {
    Self { store }
  }

  /// Append a write. Always valid: ordering is preserved and nothing is
  /// overwritten.
  pub fn enqueue(&self, write: &DeferredWrite) -> Result<i64> {
    let record = serde_json::to_string(write)
      .map_err(|e| crate::error::DataError::StoreUnavailable(format!("failed to serialize write: {}", e)))?;
    self.store.enqueue_write(&record)
  }

  /// The oldest queued write. A row that no longer deserializes can never
  /// replay, so it is dropped rather than wedging the queue.
  pub fn oldest(&self) -> Result<Option<(i64, DeferredWrite)>> {
    loop {
      let Some((seq, record)) = self.store.oldest_write()? else {
        return Ok(None);
      };

      match serde_json::from_str(&record) {
        Ok(write) => return Ok(Some((seq, write))),
        Err(e) => {
          warn!(seq, error = %e, "dropping unreadable deferred write");
          self.store.remove_write(seq)?;
        }
      }
    }
  }

  /// Discard a write whose replay the service has confirmed.
  pub fn remove(&self, seq: i64) -> Result<()> {
    self.store.remove_write(seq)
  }

  pub fn len(&self) -> Result<usize> {
    self.store.pending_write_count()
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}
