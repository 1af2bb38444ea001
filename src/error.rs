use thiserror::Error;

/// Error taxonomy for the data core.
///
/// Every facade operation resolves to exactly one of these. Read paths map
/// `NetworkUnreachable` to a cached fallback where one exists; write paths
/// absorb it into the deferred queue.
#[derive(Error, Debug)]
pub enum DataError {
  #[error("service unreachable: {0}")]
  NetworkUnreachable(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("local store unavailable: {0}")]
  StoreUnavailable(String),
}

impl DataError {
  /// Map an HTTP status to an error for a request that reached the server.
  pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
    match status.as_u16() {
      404 => DataError::NotFound(context.to_string()),
      _ => DataError::NetworkUnreachable(format!("{}: status {}", context, status)),
    }
  }
}

impl From<reqwest::Error> for DataError {
  fn from(err: reqwest::Error) -> Self {
    if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
      DataError::NotFound(err.to_string())
    } else {
      // Connect errors, timeouts and body failures all mean the remote
      // payload never arrived intact.
      DataError::NetworkUnreachable(err.to_string())
    }
  }
}

impl From<rusqlite::Error> for DataError {
  fn from(err: rusqlite::Error) -> Self {
    DataError::StoreUnavailable(err.to_string())
  }
}

pub type Result<T> = std::result::Result<T, DataError>;
