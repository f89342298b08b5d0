//! Core types describing the outcome of a cached fetch.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Result from a cached fetch, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was last fetched successfully (if known)
  pub cached_at: Option<DateTime<Utc>>,
  /// Outcome of the best-effort writes made on the way
  pub writes: Vec<WriteOutcome>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, cached_at: DateTime<Utc>, writes: Vec<WriteOutcome>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: Some(cached_at),
      writes,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
      writes: Vec::new(),
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == CacheSource::Offline
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
      writes: self.writes,
    }
  }
}

/// Indicates where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Network unavailable, serving the last cached copy
  Offline,
}

/// What a best-effort write was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
  /// Response body into the API partition
  Response,
  /// Freshness timestamp
  Freshness,
}

/// Non-fatal result of a side-effect write. Failures are logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
  Written(WriteTarget),
  Failed { target: WriteTarget, reason: String },
}

impl WriteOutcome {
  pub fn record<E: std::fmt::Display>(target: WriteTarget, result: Result<(), E>) -> Self {
    match result {
      Ok(()) => Self::Written(target),
      Err(e) => {
        warn!(?target, error = %e, "cache side-effect write failed");
        Self::Failed {
          target,
          reason: e.to_string(),
        }
      }
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, Self::Failed { .. })
  }
}
