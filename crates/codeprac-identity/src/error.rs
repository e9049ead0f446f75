//! Error type for `codeprac-identity`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("{method} {path} failed: {source}")]
  Transport {
    method: &'static str,
    path:   String,
    #[source]
    source: reqwest::Error,
  },

  /// The directory answered with a non-success status.
  #[error("{method} {path} → {status}: {body}")]
  Status {
    method: &'static str,
    path:   String,
    status: reqwest::StatusCode,
    body:   String,
  },

  #[error("unexpected response from {path}: {source}")]
  Decode {
    path:   String,
    #[source]
    source: reqwest::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
