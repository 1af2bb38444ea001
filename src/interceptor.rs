//! Install-time cache and request interception.
//!
//! The interceptor pre-caches the application shell so the directory can
//! render with no network at all, and answers outgoing requests from local
//! data when possible: shell assets from the versioned asset cache, data
//! service payloads from the structured store. Everything else passes
//! through to the network untouched (live responses are not cached
//! implicitly).

use futures::{stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{DataError, Result};
use crate::store::Store;

/// Versioned name of the shell-asset cache. Bumping it invalidates every
/// asset installed under an older name.
pub const SHELL_CACHE_NAME: &str = "restaurant-shell-003";

/// Fixed manifest of application-shell resources cached at install time.
pub const SHELL_ASSETS: &[&str] = &[
  "/",
  "/index.html",
  "/restaurant.html",
  "/css/styles.css",
  "/main.bundle.min.js",
  "/restaurant.bundle.min.js",
];

/// Canonical cache entry for restaurant-detail navigations; the shell is
/// identical for every restaurant so the query string is irrelevant.
const DETAIL_PAGE: &str = "/restaurant.html";

const INSTALL_CONCURRENCY: usize = 4;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where an intercepted response was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
  Network,
  AssetCache,
  Store,
}

/// Uniform response contract: callers observe the same shape whether the
/// answer came from the network, the asset cache or the structured store.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
  pub status: u16,
  pub content_type: String,
  pub body: Vec<u8>,
  pub origin: ResponseOrigin,
}

impl InterceptedResponse {
  /// API payloads are always JSON-encoded, regardless of origin.
  fn json(value: &serde_json::Value, origin: ResponseOrigin) -> Self {
    Self {
      status: 200,
      content_type: "application/json".to_string(),
      body: value.to_string().into_bytes(),
      origin,
    }
  }
}

pub struct RequestInterceptor {
  client: reqwest::Client,
  store: Arc<Store>,
  service_origin: Url,
  app_origin: Url,
}

impl RequestInterceptor {
  pub fn new(config: &Config, store: Arc<Store>) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .map_err(|e| DataError::NetworkUnreachable(format!("failed to build http client: {}", e)))?;

    let service_origin = Url::parse(&config.service.base_url)
      .map_err(|e| DataError::Validation(format!("bad service url: {}", e)))?;
    let app_origin = Url::parse(&config.app.base_url)
      .map_err(|e| DataError::Validation(format!("bad app url: {}", e)))?;

    Ok(Self {
      client,
      store,
      service_origin,
      app_origin,
    })
  }

  // ===== Install phase =====

  /// Pre-populate the asset cache with the shell manifest, dropping assets
  /// left over from older cache versions. A resource that fails to cache
  /// is logged and skipped; installation proceeds. Returns the number of
  /// assets installed.
  pub async fn install(&self) -> Result<usize> {
    self.store.purge_other_caches(SHELL_CACHE_NAME)?;

    let results: Vec<_> = stream::iter(SHELL_ASSETS)
      .map(|path| async move { (*path, self.fetch_asset(path).await) })
      .buffer_unordered(INSTALL_CONCURRENCY)
      .collect()
      .await;

    let mut installed = 0;
    for (path, result) in results {
      match result {
        Ok((content_type, body)) => {
          self.store.install_asset(SHELL_CACHE_NAME, path, &content_type, &body)?;
          installed += 1;
        }
        Err(e) => warn!(path, error = %e, "failed to cache shell asset"),
      }
    }

    debug!(installed, cache = SHELL_CACHE_NAME, "shell install finished");
    Ok(installed)
  }

  async fn fetch_asset(&self, path: &str) -> Result<(String, Vec<u8>)> {
    let url = self
      .app_origin
      .join(path)
      .map_err(|e| DataError::Validation(format!("bad asset path '{}': {}", path, e)))?;

    let response = self.client.get(url.clone()).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), url.as_str()));
    }

    let content_type = header_content_type(&response);
    let body = response.bytes().await?.to_vec();
    Ok((content_type, body))
  }

  // ===== Fetch interception =====

  /// Answer one outgoing request, classified by target.
  pub async fn handle(&self, request_url: &str) -> Result<InterceptedResponse> {
    let url = Url::parse(request_url)
      .map_err(|e| DataError::Validation(format!("bad request url '{}': {}", request_url, e)))?;

    if url.origin() == self.service_origin.origin() {
      self.handle_api(&url).await
    } else {
      self.handle_static(&url).await
    }
  }

  /// Data-service requests: a previously cached payload keyed by the
  /// path's trailing segment short-circuits the network; a miss fetches,
  /// stores the parsed JSON under that key, and returns it.
  async fn handle_api(&self, url: &Url) -> Result<InterceptedResponse> {
    let Some(key) = restaurant_payload_key(url) else {
      return self.passthrough(url).await;
    };

    match self.store.get_payload(&key) {
      Ok(Some(cached)) => {
        debug!(key = %key, "api payload served from store");
        return Ok(InterceptedResponse::json(&cached, ResponseOrigin::Store));
      }
      Ok(None) => {}
      Err(e) => warn!(key = %key, error = %e, "payload lookup failed, going to network"),
    }

    let response = self.client.get(url.clone()).send().await?;
    if !response.status().is_success() {
      return Err(DataError::from_status(response.status(), url.as_str()));
    }

    let body: serde_json::Value = response.json().await?;
    if let Err(e) = self.store.put_payload(&key, &body) {
      warn!(key = %key, error = %e, "skipping payload cache");
    }

    Ok(InterceptedResponse::json(&body, ResponseOrigin::Network))
  }

  /// Static and document requests: answer from the asset cache when the
  /// path is present, else hit the network. Detail-page navigations are
  /// normalized to the canonical shell entry regardless of query string.
  async fn handle_static(&self, url: &Url) -> Result<InterceptedResponse> {
    let path = if url.path().contains("restaurant.html") {
      DETAIL_PAGE
    } else {
      url.path()
    };

    match self.store.get_asset(SHELL_CACHE_NAME, path) {
      Ok(Some((content_type, body))) => {
        debug!(path, "served from asset cache");
        return Ok(InterceptedResponse {
          status: 200,
          content_type,
          body,
          origin: ResponseOrigin::AssetCache,
        });
      }
      Ok(None) => {}
      Err(e) => warn!(path, error = %e, "asset lookup failed, going to network"),
    }

    self.passthrough(url).await
  }

  async fn passthrough(&self, url: &Url) -> Result<InterceptedResponse> {
    let response = self.client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let content_type = header_content_type(&response);
    let body = response.bytes().await?.to_vec();

    Ok(InterceptedResponse {
      status,
      content_type,
      body,
      origin: ResponseOrigin::Network,
    })
  }
}

/// Cache key for restaurant-data requests: the path's trailing segment,
/// with the bare collection mapping to `"all"`. Other service routes
/// (reviews, writes) are not intercepted.
fn restaurant_payload_key(url: &Url) -> Option<String> {
  let segments: Vec<&str> = url
    .path_segments()
    .map(|s| s.filter(|seg| !seg.is_empty()).collect())
    .unwrap_or_default();

  match segments.as_slice() {
    ["restaurants"] => Some("all".to_string()),
    ["restaurants", id] => Some((*id).to_string()),
    _ => None,
  }
}

fn header_content_type(response: &reqwest::Response) -> String {
  response
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or("application/octet-stream")
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn interceptor() -> RequestInterceptor {
    // Unroutable origins: any test that reaches the network fails fast.
    let config = Config {
      service: crate::config::ServiceConfig {
        base_url: "http://127.0.0.1:1".to_string(),
      },
      app: crate::config::AppConfig {
        base_url: "http://127.0.0.1:1".to_string(),
      },
      data_dir: None,
    };
    RequestInterceptor::new(&config, Arc::new(Store::in_memory().unwrap())).unwrap()
  }

  #[test]
  fn payload_key_maps_collection_to_all() {
    let key = |s: &str| restaurant_payload_key(&Url::parse(s).unwrap());

    assert_eq!(key("http://127.0.0.1:1/restaurants").as_deref(), Some("all"));
    assert_eq!(key("http://127.0.0.1:1/restaurants/").as_deref(), Some("all"));
    assert_eq!(key("http://127.0.0.1:1/restaurants/17").as_deref(), Some("17"));
    assert_eq!(key("http://127.0.0.1:1/reviews/?restaurant_id=3"), None);
  }

  #[tokio::test]
  async fn cached_payload_short_circuits_the_network() {
    let interceptor = interceptor();
    let payload = serde_json::json!({"id": 3, "name": "Nonna"});
    interceptor.store.put_payload("3", &payload).unwrap();

    let response = interceptor.handle("http://127.0.0.1:1/restaurants/3").await.unwrap();

    assert_eq!(response.origin, ResponseOrigin::Store);
    assert_eq!(response.content_type, "application/json");
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, payload);
  }

  #[tokio::test]
  async fn detail_page_queries_share_one_cached_shell() {
    let interceptor = interceptor();
    interceptor
      .store
      .install_asset(SHELL_CACHE_NAME, DETAIL_PAGE, "text/html", b"<html>detail</html>")
      .unwrap();

    // Offline: both query strings resolve to the single cached document.
    for url in [
      "http://127.0.0.1:2/restaurant.html?id=3",
      "http://127.0.0.1:2/restaurant.html?id=7",
    ] {
      let response = interceptor.handle(url).await.unwrap();
      assert_eq!(response.origin, ResponseOrigin::AssetCache);
      assert_eq!(response.body, b"<html>detail</html>");
    }
  }

  #[tokio::test]
  async fn uncached_static_request_needs_the_network() {
    let interceptor = interceptor();
    let err = interceptor.handle("http://127.0.0.1:2/missing.css").await.unwrap_err();
    assert!(matches!(err, DataError::NetworkUnreachable(_)));
  }

  #[tokio::test]
  async fn api_miss_with_no_network_propagates() {
    let interceptor = interceptor();
    let err = interceptor.handle("http://127.0.0.1:1/restaurants/9").await.unwrap_err();
    assert!(matches!(err, DataError::NetworkUnreachable(_)));
  }
}
