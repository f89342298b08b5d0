//! Serde-deserializable types matching the upstream provider responses.
//!
//! Fields the dashboard does not use are left out; everything is optional or
//! defaulted because the providers omit keys freely.

use serde::{Deserialize, Deserializer};

/// A position on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinates {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self {
      latitude,
      longitude,
    }
  }

  /// Parse a "lat,lon" pair as typed by a user.
  pub fn parse(input: &str) -> Option<Self> {
    let (lat, lon) = input.split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;

    if !latitude.is_finite() || !longitude.is_finite() {
      return None;
    }

    Some(Self::new(latitude, longitude))
  }

  /// Placeholder location text shown until a place name is known.
  pub fn label(&self) -> String {
    format!("Lat {:.3}, Lon {:.3}", self.latitude, self.longitude)
  }
}

/// Accept a number given either as a JSON number or as a string.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(f64),
    Text(String),
  }

  Ok(match Option::<Raw>::deserialize(deserializer)? {
    Some(Raw::Number(n)) => Some(n),
    Some(Raw::Text(s)) => s.trim().parse().ok(),
    None => None,
  })
}

// ============================================================================
// Location providers
// ============================================================================

/// IP geolocation answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpLocation {
  #[serde(default, deserialize_with = "number_or_string")]
  pub latitude: Option<f64>,
  #[serde(default, deserialize_with = "number_or_string")]
  pub longitude: Option<f64>,
  pub city: Option<String>,
  pub region: Option<String>,
  pub country_name: Option<String>,
  pub country_code: Option<String>,
}

impl IpLocation {
  pub fn coordinates(&self) -> Option<Coordinates> {
    match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
      _ => None,
    }
  }

  /// "City, Region, Country" when the city is known.
  pub fn label(&self) -> Option<String> {
    let city = self.city.as_deref().filter(|c| !c.is_empty())?;
    Some(format!(
      "{}, {}, {}",
      city,
      self.region.as_deref().unwrap_or_default(),
      self.country_name.as_deref().unwrap_or_default()
    ))
  }
}

/// One forward-geocoding hit.
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
  #[serde(default, deserialize_with = "number_or_string")]
  pub lat: Option<f64>,
  #[serde(default, deserialize_with = "number_or_string")]
  pub lon: Option<f64>,
  pub display_name: Option<String>,
}

impl Place {
  pub fn coordinates(&self) -> Option<Coordinates> {
    Some(Coordinates::new(self.lat?, self.lon?))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseGeocode {
  /// Present when the provider could not resolve the position
  pub error: Option<serde_json::Value>,
  pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
  pub city: Option<String>,
  pub town: Option<String>,
  pub village: Option<String>,
  pub county: Option<String>,
  pub state: Option<String>,
  pub country: Option<String>,
  pub country_code: Option<String>,
}

impl ReverseGeocode {
  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// "Locality, State, Country" with whatever parts are known.
  pub fn label(&self) -> Option<String> {
    let a = self.address.as_ref()?;
    let locality = [&a.city, &a.town, &a.village, &a.county]
      .into_iter()
      .find_map(|part| part.as_deref().filter(|s| !s.is_empty()));

    let parts: Vec<&str> = [locality, a.state.as_deref(), a.country.as_deref()]
      .into_iter()
      .flatten()
      .filter(|s| !s.is_empty())
      .collect();

    if parts.is_empty() {
      None
    } else {
      Some(parts.join(", "))
    }
  }

  pub fn country_code(&self) -> Option<String> {
    self
      .address
      .as_ref()?
      .country_code
      .as_deref()
      .filter(|c| !c.is_empty())
      .map(str::to_ascii_uppercase)
  }
}

// ============================================================================
// Weather and air quality
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherReport {
  pub current_weather: Option<CurrentWeather>,
  #[serde(default)]
  pub daily: DailyForecast,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
  pub temperature: f64,
  #[serde(default)]
  pub windspeed: f64,
  #[serde(default)]
  pub weathercode: i64,
}

/// Parallel per-day arrays, index 0 is today.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DailyForecast {
  pub time: Vec<String>,
  pub weathercode: Vec<Option<i64>>,
  pub temperature_2m_max: Vec<Option<f64>>,
  pub temperature_2m_min: Vec<Option<f64>>,
  pub precipitation_sum: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirQualityReport {
  pub hourly: Option<AirQualityHourly>,
}

/// Parallel per-hour arrays; `time` is "YYYY-MM-DDTHH:MM" in UTC.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AirQualityHourly {
  pub time: Vec<String>,
  pub pm10: Vec<Option<f64>>,
  pub pm2_5: Vec<Option<f64>>,
  pub us_aqi: Vec<Option<f64>>,
}

// ============================================================================
// Holidays
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Holiday {
  /// "YYYY-MM-DD"
  pub date: String,
  #[serde(rename = "localName")]
  pub local_name: String,
  pub name: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_coordinates_parse() {
    assert_eq!(
      Coordinates::parse(" 51.5 , -0.12 "),
      Some(Coordinates::new(51.5, -0.12))
    );
    assert_eq!(Coordinates::parse("London"), None);
    assert_eq!(Coordinates::parse("51.5"), None);
    assert_eq!(Coordinates::parse("51.5,abc"), None);
    assert_eq!(Coordinates::parse("1,2,3"), None);
    assert_eq!(Coordinates::parse("NaN,1"), None);
  }

  #[test]
  fn test_coordinates_label() {
    assert_eq!(
      Coordinates::new(51.50735, -0.127758).label(),
      "Lat 51.507, Lon -0.128"
    );
  }

  #[test]
  fn test_place_accepts_string_coordinates() {
    let places: Vec<Place> = serde_json::from_value(json!([
      { "lat": "48.8588897", "lon": "2.3200410", "display_name": "Paris" }
    ]))
    .unwrap();

    let coords = places[0].coordinates().unwrap();
    assert!((coords.latitude - 48.8588897).abs() < 1e-9);
    assert!((coords.longitude - 2.320041).abs() < 1e-9);
  }

  #[test]
  fn test_ip_location_label_and_coordinates() {
    let ip: IpLocation = serde_json::from_value(json!({
      "latitude": 52.52, "longitude": 13.405,
      "city": "Berlin", "region": "Land Berlin",
      "country_name": "Germany", "country_code": "DE"
    }))
    .unwrap();

    assert_eq!(ip.coordinates(), Some(Coordinates::new(52.52, 13.405)));
    assert_eq!(ip.label().as_deref(), Some("Berlin, Land Berlin, Germany"));

    let rate_limited: IpLocation =
      serde_json::from_value(json!({ "error": true, "reason": "RateLimited" })).unwrap();
    assert_eq!(rate_limited.coordinates(), None);
    assert_eq!(rate_limited.label(), None);
  }

  #[test]
  fn test_reverse_geocode_label_prefers_city() {
    let rev: ReverseGeocode = serde_json::from_value(json!({
      "address": {
        "town": "Hythe", "county": "Kent", "state": "England",
        "country": "United Kingdom", "country_code": "gb"
      }
    }))
    .unwrap();

    assert_eq!(rev.label().as_deref(), Some("Hythe, England, United Kingdom"));
    assert_eq!(rev.country_code().as_deref(), Some("GB"));
    assert!(!rev.is_error());

    let failed: ReverseGeocode =
      serde_json::from_value(json!({ "error": "Unable to geocode" })).unwrap();
    assert!(failed.is_error());
    assert_eq!(failed.label(), None);
    assert_eq!(failed.country_code(), None);
  }

  #[test]
  fn test_weather_report_tolerates_nulls() {
    let report: WeatherReport = serde_json::from_value(json!({
      "current_weather": { "temperature": 12.4, "windspeed": 9.7, "weathercode": 2 },
      "daily": {
        "time": ["2026-10-18", "2026-10-19"],
        "weathercode": [2, null],
        "temperature_2m_max": [15.1, null],
        "temperature_2m_min": [7.9, 6.0],
        "precipitation_sum": [0.0, 1.2]
      }
    }))
    .unwrap();

    assert_eq!(report.current_weather.unwrap().weathercode, 2);
    assert_eq!(report.daily.weathercode, vec![Some(2), None]);
    assert_eq!(report.daily.temperature_2m_max[1], None);
  }
}
