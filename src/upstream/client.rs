//! Typed provider client on top of the fetch cache.

use std::sync::Arc;

use super::endpoints::Endpoints;
use super::types::{AirQualityReport, Coordinates, Holiday, IpLocation, Place, ReverseGeocode, WeatherReport};
use crate::cache::{CacheResult, CacheStorage, FetchCache, FreshnessStore};
use crate::error::FetchError;

type Fetched<T> = Result<CacheResult<T>, FetchError>;

/// Every call goes through `FetchCache`, so each one may be answered from
/// the cache while offline.
pub struct UpstreamClient<S: CacheStorage + FreshnessStore> {
  cache: Arc<FetchCache<S>>,
  endpoints: Endpoints,
}

impl<S: CacheStorage + FreshnessStore> Clone for UpstreamClient<S> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      endpoints: self.endpoints.clone(),
    }
  }
}

impl<S: CacheStorage + FreshnessStore> UpstreamClient<S> {
  pub fn new(cache: Arc<FetchCache<S>>, endpoints: Endpoints) -> Self {
    Self { cache, endpoints }
  }

  pub fn cache(&self) -> &Arc<FetchCache<S>> {
    &self.cache
  }

  pub async fn weather(&self, at: Coordinates) -> Fetched<WeatherReport> {
    self.cache.fetch_json(&self.endpoints.weather(at)).await
  }

  pub async fn air_quality(&self, at: Coordinates) -> Fetched<AirQualityReport> {
    self.cache.fetch_json(&self.endpoints.air_quality(at)).await
  }

  pub async fn reverse_geocode(&self, at: Coordinates) -> Fetched<ReverseGeocode> {
    self.cache.fetch_json(&self.endpoints.reverse_geocode(at)).await
  }

  /// First forward-geocoding hit for `query`, if any.
  pub async fn search_place(&self, query: &str) -> Fetched<Option<Place>> {
    let result = self
      .cache
      .fetch_json::<Vec<Place>>(&self.endpoints.search_place(query))
      .await?;

    Ok(result.map(|places| places.into_iter().next()))
  }

  pub async fn holidays(&self, year: i32, country_code: &str) -> Fetched<Vec<Holiday>> {
    self
      .cache
      .fetch_json(&self.endpoints.holidays(year, country_code))
      .await
  }

  pub async fn ip_location(&self) -> Fetched<IpLocation> {
    self.cache.fetch_json(&self.endpoints.ip_location()).await
  }
}
