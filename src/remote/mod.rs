//! The remote data source: the restaurant service's HTTP surface behind a
//! trait so the facade and replay path can run against a scripted remote
//! in tests.

mod http;

pub use http::HttpRemote;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NewReview, Restaurant, Review};

#[async_trait]
pub trait RemoteSource: Send + Sync {
  /// All restaurants, or the single restaurant matching `id`.
  async fn restaurants(&self, id: Option<u64>) -> Result<Vec<Restaurant>>;

  /// Reviews owned by one restaurant.
  async fn reviews_for(&self, restaurant_id: u64) -> Result<Vec<Review>>;

  /// Flip the favorite flag on the service's copy.
  async fn set_favorite(&self, id: u64, is_favorite: bool) -> Result<()>;

  /// Create a review; the service assigns id and timestamp.
  async fn create_review(&self, review: &NewReview) -> Result<Review>;
}
