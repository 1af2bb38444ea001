//! Data access facade: the single entry point the presentation layer calls
//! for every read and write.
//!
//! Reads go network-first and mirror successful payloads into the local
//! store; where a fallback exists (reviews), a network failure is answered
//! from the store instead. Writes made while offline are absorbed by the
//! deferred queue and replayed when connectivity returns. A store that
//! failed to open degrades the facade to network-only behavior.

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::connectivity::Connectivity;
use crate::error::{DataError, Result};
use crate::queue::{DeferredWrite, DeferredWriteQueue};
use crate::remote::RemoteSource;
use crate::store::{FavoriteState, Store};
use crate::types::{Restaurant, Review, ReviewDraft};

/// Filter sentinel meaning "no filter on this dimension".
pub const ALL: &str = "all";

/// Replay attempts per queued write before the drain gives up on it.
const MAX_REPLAY_ATTEMPTS: u32 = 3;

/// Initial backoff delay between replay attempts; doubles per attempt.
const INITIAL_BACKOFF_MS: u64 = 500;

/// Outcome of submitting a review.
#[derive(Debug)]
pub enum SubmitOutcome {
  /// Delivered to the service, which assigned id and timestamp.
  Sent(Review),
  /// Accepted for later delivery by the deferred write queue.
  Queued,
}

pub struct DataFacade<R: RemoteSource> {
  remote: Arc<R>,
  store: Option<Arc<Store>>,
  connectivity: Connectivity,
}

impl<R: RemoteSource> Clone for DataFacade<R> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      store: self.store.clone(),
      connectivity: self.connectivity.clone(),
    }
  }
}

impl<R: RemoteSource> DataFacade<R> {
  /// Build a facade over an already-constructed remote and store. Pass
  /// `None` for the store to run network-only (caching side effects are
  /// skipped and offline writes cannot be deferred).
  pub fn new(remote: R, store: Option<Store>, connectivity: Connectivity) -> Self {
    Self {
      remote: Arc::new(remote),
      store: store.map(Arc::new),
      connectivity,
    }
  }

  pub fn connectivity(&self) -> &Connectivity {
    &self.connectivity
  }

  pub fn store(&self) -> Option<&Arc<Store>> {
    self.store.as_ref()
  }

  fn queue(&self) -> Option<DeferredWriteQueue> {
    self.store.as_ref().map(|s| DeferredWriteQueue::new(Arc::clone(s)))
  }

  // ===== Reads =====

  /// All restaurants, or the single restaurant matching `id`.
  ///
  /// Network-first; the payload is mirrored into the store on success. The
  /// full catalog has no offline fallback, so a network failure propagates.
  pub async fn fetch_restaurants(&self, id: Option<u64>) -> Result<Vec<Restaurant>> {
    let restaurants = self.remote.restaurants(id).await?;

    if let Some(store) = &self.store {
      if let Err(e) = store.put_restaurants(&restaurants) {
        warn!(error = %e, "skipping restaurant cache mirror");
      }
    }

    Ok(restaurants)
  }

  /// A single restaurant, resolved through `fetch_restaurants`.
  pub async fn fetch_restaurant_by_id(&self, id: u64) -> Result<Restaurant> {
    self
      .fetch_restaurants(Some(id))
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| DataError::NotFound(format!("restaurant {}", id)))
  }

  /// Restaurants matching both filters; `"all"` disables a dimension.
  /// Matching is case-sensitive and exact.
  pub async fn fetch_restaurants_by_cuisine_and_neighborhood(
    &self,
    cuisine: &str,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>> {
    let mut results = self.fetch_restaurants(None).await?;

    if cuisine != ALL {
      results.retain(|r| r.cuisine_type == cuisine);
    }
    if neighborhood != ALL {
      results.retain(|r| r.neighborhood == neighborhood);
    }

    Ok(results)
  }

  pub async fn fetch_restaurants_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>> {
    self.fetch_restaurants_by_cuisine_and_neighborhood(cuisine, ALL).await
  }

  pub async fn fetch_restaurants_by_neighborhood(
    &self,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>> {
    self.fetch_restaurants_by_cuisine_and_neighborhood(ALL, neighborhood).await
  }

  /// Unique neighborhoods in first-occurrence order.
  pub async fn fetch_distinct_neighborhoods(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants(None).await?;
    Ok(distinct(restaurants.iter().map(|r| r.neighborhood.as_str())))
  }

  /// Unique cuisines in first-occurrence order.
  pub async fn fetch_distinct_cuisines(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants(None).await?;
    Ok(distinct(restaurants.iter().map(|r| r.cuisine_type.as_str())))
  }

  /// Reviews for one restaurant: network result mirrored into the store on
  /// success; on network failure, the store's reviews-by-restaurant index
  /// answers instead (possibly empty).
  pub async fn reviews_for_restaurant(&self, id: u64) -> Result<Vec<Review>> {
    match self.remote.reviews_for(id).await {
      Ok(reviews) => {
        if let Some(store) = &self.store {
          if let Err(e) = store.put_reviews(&reviews) {
            warn!(error = %e, "skipping review cache mirror");
          }
        }
        Ok(reviews)
      }
      Err(DataError::NetworkUnreachable(reason)) => {
        let Some(store) = &self.store else {
          return Err(DataError::NetworkUnreachable(reason));
        };
        match store.reviews_for_restaurant(id) {
          Ok(cached) => {
            debug!(restaurant = id, count = cached.len(), "serving cached reviews");
            Ok(cached)
          }
          Err(store_err) => {
            warn!(error = %store_err, "review fallback unavailable");
            Err(DataError::NetworkUnreachable(reason))
          }
        }
      }
      Err(e) => Err(e),
    }
  }

  // ===== Writes =====

  /// Flip a restaurant's favorite flag.
  ///
  /// The cached copy is stamped with the new flag (marked pending) before
  /// the PUT, so the UI reflects the intended state immediately. Success
  /// confirms the flag; an unreachable service defers the write for
  /// replay; any other failure rolls the cached copy back.
  pub async fn update_favorite(&self, id: u64, is_favorite: bool) -> Result<()> {
    let previous = match &self.store {
      Some(store) => store
        .set_favorite_local(id, is_favorite, FavoriteState::Pending)
        .unwrap_or_else(|e| {
          warn!(error = %e, "skipping optimistic favorite update");
          None
        }),
      None => None,
    };

    match self.remote.set_favorite(id, is_favorite).await {
      Ok(()) => {
        if let Some(store) = &self.store {
          if let Err(e) = store.confirm_favorite(id) {
            warn!(error = %e, "failed to confirm favorite flag");
          }
        }
        Ok(())
      }
      Err(DataError::NetworkUnreachable(_)) => {
        debug!(restaurant = id, "favorite update deferred");
        self.defer(DeferredWrite::FavoriteUpdate { id, is_favorite })
      }
      Err(e) => {
        if let (Some(store), Some(previous)) = (&self.store, previous) {
          if let Err(rollback_err) = store.put_restaurant(&previous) {
            warn!(error = %rollback_err, "failed to roll back favorite flag");
          }
        }
        Err(e)
      }
    }
  }

  /// Validate a draft review and deliver it, or queue it for later
  /// delivery when the service cannot be reached.
  pub async fn submit_review(&self, draft: &ReviewDraft) -> Result<SubmitOutcome> {
    let review = draft.validate()?;

    if !self.connectivity.is_online() {
      self.defer(DeferredWrite::NewReview { review })?;
      return Ok(SubmitOutcome::Queued);
    }

    match self.remote.create_review(&review).await {
      Ok(created) => {
        if let Some(store) = &self.store {
          if let Err(e) = store.put_review(&created) {
            warn!(error = %e, "skipping review cache mirror");
          }
        }
        Ok(SubmitOutcome::Sent(created))
      }
      Err(DataError::NetworkUnreachable(_)) => {
        debug!(restaurant = review.restaurant_id, "review deferred");
        self.defer(DeferredWrite::NewReview { review })?;
        Ok(SubmitOutcome::Queued)
      }
      Err(e) => Err(e),
    }
  }

  fn defer(&self, write: DeferredWrite) -> Result<()> {
    match self.queue() {
      Some(queue) => {
        let seq = queue.enqueue(&write)?;
        debug!(seq, "write queued for later delivery");
        Ok(())
      }
      None => Err(DataError::StoreUnavailable(
        "cannot defer a write without a local store".to_string(),
      )),
    }
  }

  // ===== Deferred write replay =====

  /// Replay queued writes oldest-first. A row is removed only once the
  /// service confirms it; the drain stops at the first row that keeps
  /// failing, so submission order is preserved for the next attempt.
  /// Returns the number of writes delivered.
  pub async fn drain_pending(&self) -> Result<usize> {
    let Some(queue) = self.queue() else {
      return Ok(0);
    };

    let mut replayed = 0;
    while let Some((seq, write)) = queue.oldest()? {
      if !self.replay_with_backoff(&write).await {
        warn!(seq, "leaving write queued after repeated replay failures");
        break;
      }
      queue.remove(seq)?;
      replayed += 1;
    }

    Ok(replayed)
  }

  async fn replay_with_backoff(&self, write: &DeferredWrite) -> bool {
    for attempt in 0..MAX_REPLAY_ATTEMPTS {
      if attempt > 0 {
        let delay = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
        sleep(Duration::from_millis(delay)).await;
      }

      match self.replay(write).await {
        Ok(()) => return true,
        Err(e) => warn!(attempt, error = %e, "replay attempt failed"),
      }
    }

    false
  }

  async fn replay(&self, write: &DeferredWrite) -> Result<()> {
    match write {
      DeferredWrite::FavoriteUpdate { id, is_favorite } => {
        self.remote.set_favorite(*id, *is_favorite).await?;
        if let Some(store) = &self.store {
          if let Err(e) = store.confirm_favorite(*id) {
            warn!(error = %e, "failed to confirm replayed favorite");
          }
        }
      }
      DeferredWrite::NewReview { review } => {
        let created = self.remote.create_review(review).await?;
        if let Some(store) = &self.store {
          if let Err(e) = store.put_review(&created) {
            warn!(error = %e, "skipping replayed review mirror");
          }
        }
      }
    }
    Ok(())
  }
}

impl<R: RemoteSource + 'static> DataFacade<R> {
  /// Watch connectivity and drain the queue on each offline-to-online
  /// transition.
  pub fn spawn_replay_worker(&self) -> tokio::task::JoinHandle<()> {
    let facade = self.clone();
    let mut rx = self.connectivity.subscribe();

    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        if *rx.borrow_and_update() {
          match facade.drain_pending().await {
            Ok(0) => {}
            Ok(n) => debug!(replayed = n, "deferred writes delivered"),
            Err(e) => warn!(error = %e, "deferred write replay failed"),
          }
        }
      }
    })
  }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut unique: Vec<String> = Vec::new();
  for value in values {
    if !unique.iter().any(|v| v == value) {
      unique.push(value.to_string());
    }
  }
  unique
}
