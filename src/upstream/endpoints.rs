//! URL builders for the upstream providers.
//!
//! The built strings are cache keys, so the same inputs must always produce
//! byte-identical URLs.

use url::form_urlencoded;

use super::types::Coordinates;
use crate::config::ProvidersConfig;

#[derive(Debug, Clone)]
pub struct Endpoints {
  providers: ProvidersConfig,
}

impl Endpoints {
  pub fn new(providers: ProvidersConfig) -> Self {
    Self { providers }
  }

  pub fn weather(&self, at: Coordinates) -> String {
    format!(
      "{}?latitude={}&longitude={}&current_weather=true\
       &daily=weathercode,temperature_2m_max,temperature_2m_min,precipitation_sum\
       &hourly=temperature_2m,precipitation,weathercode&timezone=auto&forecast_days=7",
      self.providers.weather, at.latitude, at.longitude
    )
  }

  pub fn air_quality(&self, at: Coordinates) -> String {
    format!(
      "{}?latitude={}&longitude={}&hourly=pm10,pm2_5,us_aqi",
      self.providers.air_quality, at.latitude, at.longitude
    )
  }

  pub fn reverse_geocode(&self, at: Coordinates) -> String {
    format!(
      "{}/reverse?format=jsonv2&lat={}&lon={}",
      base(&self.providers.geocode),
      at.latitude,
      at.longitude
    )
  }

  pub fn search_place(&self, query: &str) -> String {
    let q: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!(
      "{}/search?q={}&format=jsonv2&limit=1",
      base(&self.providers.geocode),
      q
    )
  }

  pub fn holidays(&self, year: i32, country_code: &str) -> String {
    format!(
      "{}/{}/{}",
      base(&self.providers.holidays),
      year,
      country_code.to_ascii_uppercase()
    )
  }

  pub fn ip_location(&self) -> String {
    self.providers.ip_location.clone()
  }
}

fn base(url: &str) -> &str {
  url.trim_end_matches('/')
}
