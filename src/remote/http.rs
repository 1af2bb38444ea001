use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::{DataError, Result};
use crate::types::{NewReview, Restaurant, Review};

use super::RemoteSource;

/// HTTP request timeout. The service is treated as unreachable past this,
/// so a hung request only ever stalls its own operation.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the restaurant data service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  base_url: String,
}

impl HttpRemote {
  pub fn new(config: &Config) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .map_err(|e| DataError::NetworkUnreachable(format!("failed to build http client: {}", e)))?;

    Ok(Self {
      client,
      base_url: config.service.base_url.trim_end_matches('/').to_string(),
    })
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }
}

#[async_trait]
impl RemoteSource for HttpRemote {
  async fn restaurants(&self, id: Option<u64>) -> Result<Vec<Restaurant>> {
    let url = match id {
      Some(id) => self.endpoint(&format!("restaurants/{}", id)),
      None => self.endpoint("restaurants"),
    };

    let response = self.client.get(&url).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), &url));
    }

    // A single-restaurant request returns one object, not an array.
    match id {
      Some(_) => {
        let restaurant: Restaurant = response.json().await?;
        Ok(vec![restaurant])
      }
      None => Ok(response.json().await?),
    }
  }

  async fn reviews_for(&self, restaurant_id: u64) -> Result<Vec<Review>> {
    let url = self.endpoint(&format!("reviews/?restaurant_id={}", restaurant_id));

    let response = self.client.get(&url).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), &url));
    }

    Ok(response.json().await?)
  }

  async fn set_favorite(&self, id: u64, is_favorite: bool) -> Result<()> {
    let url = self.endpoint(&format!("restaurants/{}/?is_favorite={}", id, is_favorite));

    let response = self.client.put(&url).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), &url));
    }

    Ok(())
  }

  async fn create_review(&self, review: &NewReview) -> Result<Review> {
    let url = self.endpoint("reviews/");

    let response = self.client.post(&url).json(review).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), &url));
    }

    Ok(response.json().await?)
  }
}
