//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::freshness::{
  display_label, format_timestamp, freshness_key, parse_timestamp, Clock, StatusUpdate,
  SystemClock, GLOBAL_KEY,
};
use super::storage::{CacheStorage, FreshnessStore};
use super::traits::{CacheResult, WriteOutcome, WriteTarget};
use crate::error::{FetchError, TransportError};
use crate::net::{Request, Response, Transport};

/// Fetch wrapper that prefers the network and falls back to the last cached
/// copy of the exact same request.
///
/// Every live success is written to the API partition and stamped in the
/// freshness store; the offline indicator is published on a watch channel.
pub struct FetchCache<S: CacheStorage + FreshnessStore> {
  transport: Arc<dyn Transport>,
  storage: Arc<S>,
  /// Partition that receives copies of successful responses
  api_partition: String,
  clock: Arc<dyn Clock>,
  status: watch::Sender<StatusUpdate>,
}

impl<S: CacheStorage + FreshnessStore> FetchCache<S> {
  pub fn new(
    transport: Arc<dyn Transport>,
    storage: Arc<S>,
    api_partition: impl Into<String>,
  ) -> Self {
    let last = storage.get(GLOBAL_KEY).ok().flatten();
    let (status, _) = watch::channel(StatusUpdate::online(display_label(last.as_deref())));

    Self {
      transport,
      storage,
      api_partition: api_partition.into(),
      clock: Arc::new(SystemClock),
      status,
    }
  }

  /// Replace the clock used to stamp freshness records.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Watch the offline indicator and "last updated" label.
  pub fn subscribe(&self) -> watch::Receiver<StatusUpdate> {
    self.status.subscribe()
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  /// Time of the most recent successful fetch of anything.
  pub fn last_updated(&self) -> Option<DateTime<Utc>> {
    self
      .storage
      .get(GLOBAL_KEY)
      .ok()
      .flatten()
      .as_deref()
      .and_then(parse_timestamp)
  }

  /// GET `url` and decode its JSON body, network first.
  ///
  /// 1. Send the request - a 2xx with a decodable body is a success
  /// 2. On success, store a copy and stamp the freshness records
  /// 3. On any failure, serve the last cached copy (offline mode)
  /// 4. Only fail when there is no usable cached copy
  pub async fn fetch_json<T: DeserializeOwned>(
    &self,
    url: &str,
  ) -> Result<CacheResult<T>, FetchError> {
    let request = Request::get(url);

    let failure = match self.transport.send(&request).await {
      Ok(response) if response.is_success() => match response.parse_json::<T>() {
        // The worker answered from its own cache; treat it like our fallback
        Ok(data) if response.from_cache() => return Ok(self.serve_offline(&request, data)),
        Ok(data) => return Ok(self.store_fresh(&request, &response, data)),
        Err(e) => e,
      },
      Ok(response) => TransportError::Status(response.status),
      Err(e) => e,
    };

    debug!(url, error = %failure, "network fetch failed, trying cache");
    self.fallback(&request, failure)
  }

  fn store_fresh<T>(&self, request: &Request, response: &Response, data: T) -> CacheResult<T> {
    let now = self.clock.now();
    let stamp = format_timestamp(now);

    let writes = vec![
      WriteOutcome::record(
        WriteTarget::Response,
        self.storage.put(&self.api_partition, request, response),
      ),
      WriteOutcome::record(
        WriteTarget::Freshness,
        self.storage.set(&freshness_key(request.url()), &stamp),
      ),
      WriteOutcome::record(
        WriteTarget::Freshness,
        self.storage.set_if_newer(GLOBAL_KEY, &stamp).map(|_| ()),
      ),
    ];

    // A concurrent fetch may have completed later than this one
    let latest = self.read_freshness(GLOBAL_KEY).unwrap_or(stamp);
    self
      .status
      .send_replace(StatusUpdate::online(display_label(Some(&latest))));

    CacheResult::from_network(data, now, writes)
  }

  fn fallback<T: DeserializeOwned>(
    &self,
    request: &Request,
    failure: TransportError,
  ) -> Result<CacheResult<T>, FetchError> {
    let unavailable = |source: TransportError| FetchError::Unavailable {
      url: request.url().to_string(),
      source,
    };

    let cached = match self.storage.match_any(request) {
      Ok(Some(cached)) => cached,
      Ok(None) => return Err(unavailable(failure)),
      Err(e) => {
        warn!(url = request.url(), error = %e, "cache read error");
        return Err(unavailable(failure));
      }
    };

    match cached.response.parse_json::<T>() {
      Ok(data) => Ok(self.serve_offline(request, data)),
      Err(e) => {
        warn!(url = request.url(), error = %e, "cached response is unusable");
        Err(unavailable(failure))
      }
    }
  }

  fn serve_offline<T>(&self, request: &Request, data: T) -> CacheResult<T> {
    let last = self
      .read_freshness(&freshness_key(request.url()))
      .or_else(|| self.read_freshness(GLOBAL_KEY));

    self
      .status
      .send_replace(StatusUpdate::offline(display_label(last.as_deref())));

    CacheResult::offline(data, last.as_deref().and_then(parse_timestamp))
  }

  fn read_freshness(&self, key: &str) -> Option<String> {
    match self.storage.get(key) {
      Ok(value) => value,
      Err(e) => {
        warn!(key, error = %e, "freshness read error");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::freshness::testing::ManualClock;
  use crate::cache::freshness::NO_TIMESTAMP;
  use crate::cache::traits::CacheSource;
  use crate::cache::{ReadOnlyStorage, SqliteStorage};
  use crate::net::testing::ScriptedTransport;
  use chrono::Duration;
  use reqwest::StatusCode;
  use serde_json::{json, Value};

  const WEATHER: &str = "https://api.open-meteo.com/v1/forecast?latitude=51.5&longitude=-0.12";

  struct Fixture {
    transport: Arc<ScriptedTransport>,
    storage: Arc<SqliteStorage>,
    clock: Arc<ManualClock>,
    cache: FetchCache<SqliteStorage>,
  }

  fn fixture() -> Fixture {
    let transport = Arc::new(ScriptedTransport::new());
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::at("2026-10-18T10:00:00Z"));
    let cache = FetchCache::new(transport.clone(), storage.clone(), "api-v1")
      .with_clock(clock.clone());

    Fixture {
      transport,
      storage,
      clock,
      cache,
    }
  }

  #[tokio::test]
  async fn test_success_stores_copy_and_freshness() {
    let f = fixture();
    f.transport.json(WEATHER, json!({ "current_weather": { "temperature": 12.3 } }));

    let result = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data["current_weather"]["temperature"], 12.3);
    assert!(result.writes.iter().all(|w| !w.is_failed()));
    assert_eq!(f.storage.entry_count("api-v1").unwrap(), 1);
    assert_eq!(
      f.storage.get(&freshness_key(WEATHER)).unwrap().as_deref(),
      Some("2026-10-18T10:00:00.000Z")
    );
    assert_eq!(
      f.storage.get(GLOBAL_KEY).unwrap().as_deref(),
      Some("2026-10-18T10:00:00.000Z")
    );

    let status = f.cache.subscribe().borrow().clone();
    assert!(!status.offline);
    assert_eq!(
      status.last_updated,
      display_label(Some("2026-10-18T10:00:00.000Z"))
    );
  }

  #[tokio::test]
  async fn test_outage_round_trips_through_cache() {
    let f = fixture();
    let payload = json!({ "hourly": { "us_aqi": [12, 14, 15] }, "nested": [1, { "a": null }] });
    f.transport.json(WEATHER, payload.clone());

    let online = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    f.transport.set_online(false);
    f.clock.advance(Duration::hours(2));
    let offline = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert_eq!(online.data, offline.data);
    assert_eq!(offline.data, payload);
    assert!(offline.is_offline());
    assert_eq!(
      offline.cached_at,
      parse_timestamp("2026-10-18T10:00:00.000Z")
    );

    let status = f.cache.subscribe().borrow().clone();
    assert!(status.offline);
    assert_eq!(
      status.last_updated,
      display_label(Some("2026-10-18T10:00:00.000Z"))
    );

    // Serving from cache does not touch freshness
    assert_eq!(
      f.storage.get(GLOBAL_KEY).unwrap().as_deref(),
      Some("2026-10-18T10:00:00.000Z")
    );
  }

  #[tokio::test]
  async fn test_outage_without_cache_is_hard_failure() {
    let f = fixture();
    f.transport.set_online(false);

    let err = f.cache.fetch_json::<Value>(WEATHER).await.unwrap_err();

    assert_eq!(err.url(), WEATHER);
    assert!(matches!(err.cause(), TransportError::Network(_)));
    assert!(f.storage.get(GLOBAL_KEY).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_non_success_status_falls_back_to_cache() {
    let f = fixture();
    f.transport.json(WEATHER, json!({ "ok": true }));
    f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    f.transport
      .route(WEATHER, Response::empty(StatusCode::INTERNAL_SERVER_ERROR));
    let result = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert!(result.is_offline());
    assert_eq!(result.data, json!({ "ok": true }));
  }

  #[tokio::test]
  async fn test_non_success_status_without_cache_reports_status() {
    let f = fixture();
    f.transport
      .route(WEATHER, Response::empty(StatusCode::SERVICE_UNAVAILABLE));

    let err = f.cache.fetch_json::<Value>(WEATHER).await.unwrap_err();

    assert_eq!(
      err.cause(),
      &TransportError::Status(StatusCode::SERVICE_UNAVAILABLE)
    );
    assert_eq!(f.storage.entry_count("api-v1").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_malformed_json_is_treated_like_a_network_error() {
    let f = fixture();
    f.transport.json(WEATHER, json!([1, 2, 3]));
    f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    f.transport
      .route(WEATHER, Response::new(StatusCode::OK, "<!doctype html>"));
    let result = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert!(result.is_offline());
    assert_eq!(result.data, json!([1, 2, 3]));
  }

  #[tokio::test]
  async fn test_offline_label_falls_back_to_global_then_placeholder() {
    let f = fixture();
    let req = Request::get(WEATHER);

    // Cached entry without any freshness record
    f.storage
      .put("api-v1", &req, &Response::json(StatusCode::OK, &json!({})))
      .unwrap();
    f.transport.set_online(false);

    f.cache.fetch_json::<Value>(WEATHER).await.unwrap();
    assert_eq!(f.cache.subscribe().borrow().last_updated, NO_TIMESTAMP);

    f.storage
      .set(GLOBAL_KEY, "2026-10-17T08:00:00.000Z")
      .unwrap();
    let result = f.cache.fetch_json::<Value>(WEATHER).await.unwrap();
    assert_eq!(
      f.cache.subscribe().borrow().last_updated,
      display_label(Some("2026-10-17T08:00:00.000Z"))
    );
    assert_eq!(
      result.cached_at,
      parse_timestamp("2026-10-17T08:00:00.000Z")
    );
  }

  #[tokio::test]
  async fn test_global_freshness_is_latest_completion() {
    let f = fixture();
    let urls = [
      "https://api.open-meteo.com/a",
      "https://air-quality-api.open-meteo.com/b",
      "https://nominatim.openstreetmap.org/c",
    ];
    for url in urls {
      f.transport.json(url, json!({ "url": url }));
    }

    // Completions arrive out of wall-clock order
    f.clock.set("2026-10-18T12:00:05Z");
    f.cache.fetch_json::<Value>(urls[1]).await.unwrap();
    f.clock.set("2026-10-18T12:00:09Z");
    f.cache.fetch_json::<Value>(urls[0]).await.unwrap();
    f.clock.set("2026-10-18T12:00:07Z");
    f.cache.fetch_json::<Value>(urls[2]).await.unwrap();

    assert_eq!(
      f.cache.last_updated(),
      parse_timestamp("2026-10-18T12:00:09Z")
    );
    assert_eq!(
      f.storage.get(&freshness_key(urls[2])).unwrap().as_deref(),
      Some("2026-10-18T12:00:07.000Z")
    );
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_the_cache() {
    let f = fixture();
    let a = "https://api.open-meteo.com/a";
    let b = "https://date.nager.at/api/v3/PublicHolidays/2026/GB";
    f.transport.json(a, json!(1));
    f.transport.json(b, json!(2));

    let (ra, rb) = tokio::join!(
      f.cache.fetch_json::<Value>(a),
      f.cache.fetch_json::<Value>(b)
    );

    assert_eq!(ra.unwrap().data, json!(1));
    assert_eq!(rb.unwrap().data, json!(2));
    assert_eq!(f.storage.entry_count("api-v1").unwrap(), 2);
    assert_eq!(f.transport.hits(a), 1);
  }

  #[tokio::test]
  async fn test_failed_writes_do_not_fail_the_fetch() {
    let transport = Arc::new(ScriptedTransport::new());
    let storage = Arc::new(ReadOnlyStorage::new());
    let cache = FetchCache::new(transport.clone(), storage, "api-v1")
      .with_clock(Arc::new(ManualClock::at("2026-10-18T10:00:00Z")));
    transport.json(WEATHER, json!({ "a": 1 }));

    let result = cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, json!({ "a": 1 }));
    assert_eq!(result.writes.iter().filter(|w| w.is_failed()).count(), 3);
    assert!(matches!(
      result.writes[0],
      WriteOutcome::Failed { target: WriteTarget::Response, .. }
    ));
    let status = cache.subscribe().borrow().clone();
    assert!(!status.offline);
    assert_eq!(
      status.last_updated,
      display_label(Some("2026-10-18T10:00:00.000Z"))
    );

    // Nothing was stored, so the next outage is a hard failure
    transport.set_online(false);
    let err = cache.fetch_json::<Value>(WEATHER).await.unwrap_err();
    assert!(matches!(err, FetchError::Unavailable { .. }));
    assert!(matches!(err.cause(), TransportError::Network(_)));
  }

  #[tokio::test]
  async fn test_online_label_never_goes_back_in_time() {
    let f = fixture();
    f.storage.set(GLOBAL_KEY, "2026-10-18T11:00:00.000Z").unwrap();
    f.transport.json(WEATHER, json!({}));

    f.cache.fetch_json::<Value>(WEATHER).await.unwrap();

    assert_eq!(
      f.cache.subscribe().borrow().last_updated,
      display_label(Some("2026-10-18T11:00:00.000Z"))
    );
    assert_eq!(
      f.storage.get(&freshness_key(WEATHER)).unwrap().as_deref(),
      Some("2026-10-18T10:00:00.000Z")
    );
  }

  #[tokio::test]
  async fn test_initial_status_reads_stored_global_record() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.set(GLOBAL_KEY, "2026-10-01T00:00:00.000Z").unwrap();

    let cache = FetchCache::new(Arc::new(ScriptedTransport::new()), storage, "api-v1");
    let status = cache.subscribe().borrow().clone();

    assert!(!status.offline);
    assert_eq!(
      status.last_updated,
      display_label(Some("2026-10-01T00:00:00.000Z"))
    );
  }
}
