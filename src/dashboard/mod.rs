//! Fetch orchestration: resolve a location, then load every dashboard section.
//!
//! Only one orchestration runs at a time. Each one is stamped with a
//! generation number so the UI can drop results that arrive out of order.

pub mod location;
pub mod summary;

use chrono::{Datelike, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheStorage, FreshnessStore};
use crate::error::FetchError;
use crate::upstream::types::{Holiday, IpLocation};
use crate::upstream::{Coordinates, UpstreamClient};

use location::Locator;
use summary::{upcoming_holidays, AirQualitySummary, Section, WeatherSummary};

/// How long to wait for the device position before falling back.
pub const LOCATE_TIMEOUT: Duration = Duration::from_secs(9);

pub const LOCATING: &str = "Locating…";
pub const LOCATION_UNKNOWN: &str = "Location unknown - grant location or enter a city manually.";
pub const PLACE_NOT_FOUND: &str = "Couldn't locate that place.";
pub const SEARCH_FAILED: &str = "Search failed. Try again.";
pub const AIR_QUALITY_UNAVAILABLE: &str = "Air quality unavailable";
pub const AIR_QUALITY_ERROR: &str = "AQ data error";
pub const HOLIDAYS_FAILED: &str = "Couldn't load holidays.";
pub const COUNTRY_NOT_FOUND: &str = "Country not found; holidays unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
  Idle,
  Fetching { generation: u64 },
}

/// Everything one orchestration loaded.
#[derive(Debug, Clone)]
pub struct Snapshot {
  pub generation: u64,
  pub coordinates: Coordinates,
  pub location: String,
  pub weather: WeatherSummary,
  pub air_quality: Section<AirQualitySummary>,
  pub holidays: Section<Vec<Holiday>>,
  /// At least one section was served from the cache
  pub offline: bool,
}

#[derive(Debug, Clone)]
pub enum Outcome {
  /// Another orchestration is in flight; nothing was done
  Busy,
  /// Empty search query
  Skipped,
  Loaded(Box<Snapshot>),
  /// No position could be resolved; `message` replaces the location label
  NoLocation { generation: u64, message: String },
  /// The primary (weather) data could not be loaded
  Failed { generation: u64, message: String },
}

impl Outcome {
  pub fn generation(&self) -> Option<u64> {
    match self {
      Self::Busy | Self::Skipped => None,
      Self::Loaded(snapshot) => Some(snapshot.generation),
      Self::NoLocation { generation, .. } | Self::Failed { generation, .. } => Some(*generation),
    }
  }
}

/// Resets the fetch state to `Idle` however the orchestration ends.
struct FetchGuard<'a> {
  state: &'a Mutex<FetchState>,
  generation: u64,
}

impl Drop for FetchGuard<'_> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.state.lock() {
      *state = FetchState::Idle;
    }
  }
}

pub struct Dashboard<S: CacheStorage + FreshnessStore> {
  client: UpstreamClient<S>,
  locator: Arc<dyn Locator>,
  locate_timeout: Duration,
  state: Mutex<FetchState>,
  generation: AtomicU64,
}

impl<S: CacheStorage + FreshnessStore> Dashboard<S> {
  pub fn new(client: UpstreamClient<S>, locator: Arc<dyn Locator>) -> Self {
    Self {
      client,
      locator,
      locate_timeout: LOCATE_TIMEOUT,
      state: Mutex::new(FetchState::Idle),
      generation: AtomicU64::new(0),
    }
  }

  pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
    self.locate_timeout = timeout;
    self
  }

  pub fn state(&self) -> FetchState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(FetchState::Idle)
  }

  /// Generation of the most recently started orchestration.
  pub fn latest_generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  fn begin(&self) -> Option<FetchGuard<'_>> {
    let mut state = self.state.lock().ok()?;
    if let FetchState::Fetching { generation } = *state {
      debug!(generation, "orchestration already running");
      return None;
    }

    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *state = FetchState::Fetching { generation };

    Some(FetchGuard {
      state: &self.state,
      generation,
    })
  }

  /// Resolve a position (device, then IP lookup, then `manual_place`) and
  /// load everything for it.
  ///
  /// `manual_place` is either "lat,lon" or a place name to geocode.
  pub async fn locate_and_fetch(&self, manual_place: Option<&str>) -> Outcome {
    let Some(guard) = self.begin() else {
      return Outcome::Busy;
    };
    let generation = guard.generation;

    match tokio::time::timeout(self.locate_timeout, self.locator.locate()).await {
      Ok(Ok(at)) => return self.load(generation, at, None).await,
      Ok(Err(e)) => warn!(error = %e, "device position unavailable"),
      Err(_) => warn!(timeout = ?self.locate_timeout, "device position timed out"),
    }

    match self.client.ip_location().await {
      Ok(result) => {
        let ip = result.data;
        if let Some(at) = ip.coordinates() {
          return self.load(generation, at, Some(ip)).await;
        }
        warn!("IP location has no coordinates");
      }
      Err(e) => warn!(error = %e, "IP location lookup failed"),
    }

    let Some(place) = manual_place.map(str::trim).filter(|p| !p.is_empty()) else {
      return Outcome::NoLocation {
        generation,
        message: LOCATION_UNKNOWN.to_string(),
      };
    };

    if let Some(at) = Coordinates::parse(place) {
      return self.load(generation, at, None).await;
    }

    match self.client.search_place(place).await {
      Ok(result) => match result.data.and_then(|p| p.coordinates()) {
        Some(at) => self.load(generation, at, None).await,
        None => Outcome::NoLocation {
          generation,
          message: PLACE_NOT_FOUND.to_string(),
        },
      },
      Err(e) => {
        warn!(place, error = %e, "geocoding the manual place failed");
        Outcome::NoLocation {
          generation,
          message: PLACE_NOT_FOUND.to_string(),
        }
      }
    }
  }

  /// Load everything for a typed query: "lat,lon" or a place name.
  pub async fn search(&self, query: &str) -> Outcome {
    let query = query.trim();
    if query.is_empty() {
      return Outcome::Skipped;
    }

    let Some(guard) = self.begin() else {
      return Outcome::Busy;
    };
    let generation = guard.generation;

    let at = match Coordinates::parse(query) {
      Some(at) => at,
      None => match self.client.search_place(query).await {
        Ok(result) => match result.data.and_then(|p| p.coordinates()) {
          Some(at) => at,
          None => {
            return Outcome::NoLocation {
              generation,
              message: format!("Couldn't find \"{}\"", query),
            }
          }
        },
        Err(e) => {
          warn!(query, error = %e, "search failed");
          return Outcome::Failed {
            generation,
            message: SEARCH_FAILED.to_string(),
          };
        }
      },
    };

    match self.fetch_all(generation, at, None).await {
      Ok(snapshot) => Outcome::Loaded(Box::new(snapshot)),
      Err(e) => {
        warn!(query, error = %e, "search failed");
        Outcome::Failed {
          generation,
          message: SEARCH_FAILED.to_string(),
        }
      }
    }
  }

  async fn load(&self, generation: u64, at: Coordinates, ip: Option<IpLocation>) -> Outcome {
    match self.fetch_all(generation, at, ip).await {
      Ok(snapshot) => Outcome::Loaded(Box::new(snapshot)),
      Err(e) => Outcome::Failed {
        generation,
        message: format!("Weather unavailable: {}", e),
      },
    }
  }

  /// Weather, air quality and reverse geocoding run concurrently; holidays
  /// follow once the country is known. Only a weather failure is fatal.
  pub async fn fetch_all(
    &self,
    generation: u64,
    at: Coordinates,
    ip: Option<IpLocation>,
  ) -> Result<Snapshot, FetchError> {
    info!(generation, lat = at.latitude, lon = at.longitude, "fetching dashboard data");

    let (weather, air_quality, reverse) = tokio::join!(
      self.client.weather(at),
      self.client.air_quality(at),
      self.client.reverse_geocode(at),
    );

    let weather = weather?;
    let mut offline = weather.is_offline();
    let now = self.client.cache().clock().now();

    let reverse = match reverse {
      Ok(result) => {
        offline |= result.is_offline();
        Some(result.data).filter(|r| !r.is_error())
      }
      Err(e) => {
        warn!(error = %e, "reverse geocoding failed");
        None
      }
    };

    let location = reverse
      .as_ref()
      .and_then(|r| r.label())
      .or_else(|| ip.as_ref().and_then(|ip| ip.label()))
      .unwrap_or_else(|| at.label());

    let air_quality = match air_quality {
      Ok(result) => {
        offline |= result.is_offline();
        match AirQualitySummary::from_report(&result.data, now) {
          Some(summary) => Section::Ready(summary),
          None => Section::unavailable(AIR_QUALITY_ERROR),
        }
      }
      Err(e) => {
        warn!(error = %e, "air quality fetch failed");
        Section::unavailable(AIR_QUALITY_UNAVAILABLE)
      }
    };

    let country = reverse
      .as_ref()
      .and_then(|r| r.country_code())
      .or_else(|| {
        ip.as_ref()
          .and_then(|ip| ip.country_code.as_deref())
          .filter(|c| !c.is_empty())
          .map(str::to_ascii_uppercase)
      });

    let holidays = match country {
      Some(country) => {
        let year = now.with_timezone(&Local).year();
        match self.client.holidays(year, &country).await {
          Ok(result) => {
            offline |= result.is_offline();
            match upcoming_holidays(result.data, now.date_naive()) {
              Ok(list) => Section::Ready(list),
              Err(message) => Section::Unavailable(message),
            }
          }
          Err(e) => {
            warn!(country = %country, error = %e, "holiday fetch failed");
            Section::unavailable(HOLIDAYS_FAILED)
          }
        }
      }
      None => Section::unavailable(COUNTRY_NOT_FOUND),
    };

    Ok(Snapshot {
      generation,
      coordinates: at,
      location,
      weather: WeatherSummary::from_report(&weather.data),
      air_quality,
      holidays,
      offline,
    })
  }
}
