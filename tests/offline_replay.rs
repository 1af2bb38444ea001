//! Deferred-write round trips against a scripted remote, including queue
//! durability across a simulated reload (a fresh facade over the same
//! store file).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bitecache::types::{LatLng, NewReview, Restaurant, Review, ReviewDraft};
use bitecache::{Connectivity, DataError, DataFacade, RemoteSource, Store, SubmitOutcome};

/// Remote that records every delivered write and can be switched off.
#[derive(Clone, Default)]
struct ScriptedRemote {
  unreachable: Arc<AtomicBool>,
  favorites: Arc<Mutex<Vec<(u64, bool)>>>,
  reviews: Arc<Mutex<Vec<NewReview>>>,
}

impl ScriptedRemote {
  fn check(&self) -> Result<(), DataError> {
    if self.unreachable.load(Ordering::SeqCst) {
      Err(DataError::NetworkUnreachable("scripted outage".to_string()))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
  async fn restaurants(&self, _id: Option<u64>) -> Result<Vec<Restaurant>, DataError> {
    self.check()?;
    Ok(vec![Restaurant {
      id: 1,
      name: "Nonna".to_string(),
      neighborhood: "Queens".to_string(),
      address: "1 Main St".to_string(),
      latlng: LatLng { lat: 40.7, lng: -73.9 },
      cuisine_type: "Italian".to_string(),
      photograph: None,
      is_favorite: false,
    }])
  }

  async fn reviews_for(&self, _restaurant_id: u64) -> Result<Vec<Review>, DataError> {
    self.check()?;
    Ok(Vec::new())
  }

  async fn set_favorite(&self, id: u64, is_favorite: bool) -> Result<(), DataError> {
    self.check()?;
    self.favorites.lock().unwrap().push((id, is_favorite));
    Ok(())
  }

  async fn create_review(&self, review: &NewReview) -> Result<Review, DataError> {
    self.check()?;
    let mut sent = self.reviews.lock().unwrap();
    sent.push(review.clone());
    Ok(Review {
      id: sent.len() as u64,
      restaurant_id: review.restaurant_id,
      name: review.name.clone(),
      rating: review.rating,
      comments: review.comments.clone(),
      created_at: chrono::Utc::now(),
    })
  }
}

fn draft(restaurant_id: &str) -> ReviewDraft {
  ReviewDraft {
    restaurant_id: restaurant_id.to_string(),
    name: "Ada".to_string(),
    rating: "5".to_string(),
    comments: "queued while offline".to_string(),
  }
}

#[tokio::test]
async fn queued_review_survives_reload_and_replays_once() {
  let dir = tempfile::tempdir().unwrap();
  let db_path = dir.path().join("data.db");
  let remote = ScriptedRemote::default();

  // Session one: offline submission lands in the durable queue.
  {
    let store = Store::open_at(&db_path).unwrap();
    let facade = DataFacade::new(remote.clone(), Some(store), Connectivity::new(false));

    let outcome = facade.submit_review(&draft("1")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Queued));
    assert!(remote.reviews.lock().unwrap().is_empty());
  }

  // Session two (after "reload"): reconnect drains the queue.
  let store = Store::open_at(&db_path).unwrap();
  let facade = DataFacade::new(remote.clone(), Some(store), Connectivity::new(true));

  assert_eq!(facade.drain_pending().await.unwrap(), 1);

  let sent = remote.reviews.lock().unwrap();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].restaurant_id, 1);
  assert_eq!(sent[0].rating, 5);
  drop(sent);

  // Queue is back to empty: nothing more to deliver.
  assert_eq!(facade.drain_pending().await.unwrap(), 0);
  assert_eq!(remote.reviews.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn mixed_backlog_replays_in_submission_order_across_reload() {
  let dir = tempfile::tempdir().unwrap();
  let db_path = dir.path().join("data.db");
  let remote = ScriptedRemote::default();

  {
    let store = Store::open_at(&db_path).unwrap();
    let facade = DataFacade::new(remote.clone(), Some(store), Connectivity::new(true));
    facade.fetch_restaurants(None).await.unwrap();

    // Outage mid-session: one favorite, then one review, both deferred.
    remote.unreachable.store(true, Ordering::SeqCst);
    facade.update_favorite(1, true).await.unwrap();
    facade.connectivity().set_online(false);
    facade.submit_review(&draft("1")).await.unwrap();

    assert_eq!(facade.store().unwrap().pending_write_count().unwrap(), 2);
  }

  remote.unreachable.store(false, Ordering::SeqCst);

  let store = Store::open_at(&db_path).unwrap();
  let facade = DataFacade::new(remote.clone(), Some(store), Connectivity::new(true));
  assert_eq!(facade.drain_pending().await.unwrap(), 2);

  // The favorite was submitted first and delivered first.
  assert_eq!(*remote.favorites.lock().unwrap(), vec![(1, true)]);
  assert_eq!(remote.reviews.lock().unwrap().len(), 1);
  assert_eq!(facade.store().unwrap().pending_write_count().unwrap(), 0);
}

#[tokio::test]
async fn network_only_facade_cannot_defer_offline_writes() {
  let remote = ScriptedRemote::default();
  let facade = DataFacade::new(remote, None, Connectivity::new(false));

  let err = facade.submit_review(&draft("1")).await.unwrap_err();
  assert!(matches!(err, DataError::StoreUnavailable(_)));
}
