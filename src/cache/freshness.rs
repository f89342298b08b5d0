//! Freshness records: when did a request last succeed?

use chrono::{DateTime, Local, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Key prefix shared by every freshness record.
const KEY_PREFIX: &str = "last_update:";

/// Record updated by every successful fetch; drives the "last updated" indicator.
pub const GLOBAL_KEY: &str = "last_update:global";

/// Shown instead of a timestamp when nothing was ever fetched.
pub const NO_TIMESTAMP: &str = "-";

/// Per-URL freshness key.
pub fn freshness_key(url: &str) -> String {
  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
}

/// Stored timestamp format. Fixed width, so string order is time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Human label for a stored timestamp, in local time.
pub fn display_label(stored: Option<&str>) -> String {
  stored
    .and_then(parse_timestamp)
    .map(|at| {
      at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
    })
    .unwrap_or_else(|| NO_TIMESTAMP.to_string())
}

/// Source of "now". Swappable so freshness ordering can be tested.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Offline indicator + "last updated" label, as published to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
  pub offline: bool,
  pub last_updated: String,
}

impl StatusUpdate {
  pub fn online(last_updated: impl Into<String>) -> Self {
    Self {
      offline: false,
      last_updated: last_updated.into(),
    }
  }

  pub fn offline(last_updated: impl Into<String>) -> Self {
    Self {
      offline: true,
      last_updated: last_updated.into(),
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_freshness_key_uses_full_hash() {
    let a = freshness_key("https://api.open-meteo.com/v1/forecast?latitude=51.5&longitude=-0.12");
    let b = freshness_key("https://api.open-meteo.com/v1/forecast?latitude=51.5&longitude=-0.13");

    assert_ne!(a, b);
    assert!(a.starts_with(KEY_PREFIX));
    assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    assert_ne!(a, GLOBAL_KEY);
  }

  #[test]
  fn test_timestamp_format_orders_lexicographically() {
    let earlier = parse_timestamp("2026-10-18T09:59:59.999Z").unwrap();
    let later = parse_timestamp("2026-10-18T10:00:00Z").unwrap();

    let (a, b) = (format_timestamp(earlier), format_timestamp(later));
    assert_eq!(b, "2026-10-18T10:00:00.000Z");
    assert!(a < b);
    assert_eq!(parse_timestamp(&b), Some(later));
  }

  #[test]
  fn test_display_label_placeholder() {
    assert_eq!(display_label(None), NO_TIMESTAMP);
    assert_eq!(display_label(Some("not a date")), NO_TIMESTAMP);
    assert_ne!(display_label(Some("2026-10-18T10:00:00.000Z")), NO_TIMESTAMP);
  }
}
