//! Error types for the data-fetch layer.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single network attempt produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  /// Host unreachable, connection refused, DNS failure, ...
  #[error("network unreachable: {0}")]
  Network(String),
  #[error("request timed out")]
  Timeout,
  /// The upstream answered with a non-2xx status.
  #[error("upstream responded with {0}")]
  Status(StatusCode),
  /// The body was not the JSON we expected.
  #[error("malformed response body: {0}")]
  Parse(String),
}

/// Hard failure of a cached fetch.
///
/// Only raised when the network attempt failed *and* there was no usable
/// cached copy of the exact request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  #[error("{url} is unavailable and not cached ({source})")]
  Unavailable {
    url: String,
    #[source]
    source: TransportError,
  },
}

impl FetchError {
  pub fn url(&self) -> &str {
    match self {
      Self::Unavailable { url, .. } => url,
    }
  }

  /// The transport error of the network attempt.
  pub fn cause(&self) -> &TransportError {
    match self {
      Self::Unavailable { source, .. } => source,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unavailable_keeps_original_cause() {
    let err = FetchError::Unavailable {
      url: "https://ipapi.co/json/".to_string(),
      source: TransportError::Timeout,
    };

    assert_eq!(err.url(), "https://ipapi.co/json/");
    assert_eq!(err.cause(), &TransportError::Timeout);
    assert!(err.to_string().contains("timed out"));
  }
}
