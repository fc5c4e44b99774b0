//! Structured error types for the HAR engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarError {
  /// A response payload did not have the shape the populator needs. This is
  /// the only engine failure that aborts a conversion.
  #[error("population: request {request_id}: {source}")]
  Population {
    request_id: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl HarError {
  pub fn population(request_id: &str, source: serde_json::Error) -> Self {
    Self::Population {
      request_id: request_id.to_string(),
      source,
    }
  }
}
