//! Display-ready summaries derived from raw provider payloads.

use chrono::{DateTime, NaiveDate, Utc};

use crate::upstream::types::{AirQualityReport, DailyForecast, Holiday, WeatherReport};

/// Most alerts shown at once.
const MAX_ALERTS: usize = 3;
/// Most upcoming holidays listed.
const MAX_HOLIDAYS: usize = 8;

const THUNDER_CODES: [i64; 3] = [95, 96, 99];
const SNOW_CODES: [i64; 5] = [71, 73, 75, 85, 86];

/// A dashboard section that either loaded or shows a reason instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
  Ready(T),
  Unavailable(String),
}

impl<T> Section<T> {
  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::Unavailable(message.into())
  }

  pub fn ready(&self) -> Option<&T> {
    match self {
      Self::Ready(value) => Some(value),
      Self::Unavailable(_) => None,
    }
  }
}

/// Round half up, the way the numbers are displayed everywhere.
fn round(x: f64) -> i64 {
  (x + 0.5).floor() as i64
}

fn round1(x: f64) -> f64 {
  (x * 10.0 + 0.5).floor() / 10.0
}

/// WMO weather code description.
pub fn describe_weather(code: i64) -> &'static str {
  match code {
    0 => "Clear",
    1 => "Mainly clear",
    2 => "Partly cloudy",
    3 => "Overcast",
    45 => "Fog",
    48 => "Depositing rime fog",
    51 => "Light drizzle",
    53 => "Moderate drizzle",
    55 => "Dense drizzle",
    61 => "Slight rain",
    63 => "Moderate rain",
    65 => "Heavy rain",
    71 => "Light snow",
    73 => "Moderate snow",
    75 => "Heavy snow",
    80 => "Showers",
    81 => "Moderate showers",
    82 => "Heavy showers",
    95 => "Thunderstorm",
    96 => "Thunderstorm w/ hail",
    99 => "Severe thunderstorm",
    _ => "Weather",
  }
}

// ============================================================================
// Weather
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
  /// °C, rounded
  pub temperature: i64,
  pub code: i64,
  pub description: &'static str,
  /// km/h, rounded
  pub wind: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
  /// "Today", then short weekday names
  pub label: String,
  pub code: Option<i64>,
  pub max: Option<i64>,
  pub min: Option<i64>,
  /// mm, one decimal
  pub precipitation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSummary {
  pub current: Option<CurrentConditions>,
  /// Today's high and low
  pub high_low: Option<(i64, i64)>,
  /// Today's precipitation, mm, one decimal
  pub precipitation: f64,
  pub forecast: Vec<ForecastDay>,
  pub alerts: Vec<String>,
}

impl WeatherSummary {
  pub fn from_report(report: &WeatherReport) -> Self {
    let daily = &report.daily;
    let current = report.current_weather.as_ref().map(|cw| CurrentConditions {
      temperature: round(cw.temperature),
      code: cw.weathercode,
      description: describe_weather(cw.weathercode),
      wind: round(cw.windspeed),
    });

    let high_low = match (max_at(daily, 0), min_at(daily, 0)) {
      (Some(max), Some(min)) => Some((round(max), round(min))),
      _ => None,
    };

    Self {
      current,
      high_low,
      precipitation: round1(precipitation_at(daily, 0)),
      forecast: forecast(daily),
      alerts: alerts(daily),
    }
  }
}

fn max_at(daily: &DailyForecast, i: usize) -> Option<f64> {
  daily.temperature_2m_max.get(i).copied().flatten()
}

fn min_at(daily: &DailyForecast, i: usize) -> Option<f64> {
  daily.temperature_2m_min.get(i).copied().flatten()
}

fn precipitation_at(daily: &DailyForecast, i: usize) -> f64 {
  daily
    .precipitation_sum
    .get(i)
    .copied()
    .flatten()
    .unwrap_or(0.0)
}

fn code_at(daily: &DailyForecast, i: usize) -> Option<i64> {
  daily.weathercode.get(i).copied().flatten()
}

fn parse_day(day: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn forecast(daily: &DailyForecast) -> Vec<ForecastDay> {
  daily
    .time
    .iter()
    .enumerate()
    .map(|(i, day)| ForecastDay {
      label: if i == 0 {
        "Today".to_string()
      } else {
        parse_day(day)
          .map(|d| d.format("%a").to_string())
          .unwrap_or_else(|| day.clone())
      },
      code: code_at(daily, i),
      max: max_at(daily, i).map(round),
      min: min_at(daily, i).map(round),
      precipitation: round1(precipitation_at(daily, i)),
    })
    .collect()
}

/// Up to three distinct alerts across the forecast window.
fn alerts(daily: &DailyForecast) -> Vec<String> {
  let mut alerts: Vec<String> = Vec::new();
  let mut push = |alert: String| {
    if !alerts.contains(&alert) {
      alerts.push(alert);
    }
  };

  for (i, day) in daily.time.iter().enumerate() {
    let code = code_at(daily, i);
    let precipitation = precipitation_at(daily, i);
    let max = max_at(daily, i).unwrap_or(0.0);
    let date = parse_day(day)
      .map(|d| d.format("%a %-d %b").to_string())
      .unwrap_or_else(|| day.clone());
    let today = i == 0;

    if code.is_some_and(|c| THUNDER_CODES.contains(&c)) {
      push(if today {
        "Thunderstorms expected today".to_string()
      } else {
        format!("Thunderstorms {date}")
      });
    }
    if precipitation >= 20.0 {
      push(if today {
        "Heavy rain likely today".to_string()
      } else {
        format!("Heavy rain {date}")
      });
    }
    if max >= 35.0 {
      push(if today {
        "Heat alert: very hot today".to_string()
      } else {
        format!("High {}° on {date}", round(max))
      });
    }
    if code.is_some_and(|c| SNOW_CODES.contains(&c)) && precipitation > 0.0 {
      push(if today {
        "Snow expected today".to_string()
      } else {
        format!("Snow {date}")
      });
    }
  }

  alerts.truncate(MAX_ALERTS);
  alerts
}

// ============================================================================
// Air quality
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AirQualitySummary {
  /// US AQI, measured or approximated from PM2.5
  pub aqi: Option<i64>,
  pub label: &'static str,
  pub advice: &'static str,
  pub pm25: Option<f64>,
  pub pm10: Option<f64>,
}

impl AirQualitySummary {
  /// Summarize the hour matching `now` (UTC), or the last hour reported.
  /// `None` when the payload has no hourly block at all.
  pub fn from_report(report: &AirQualityReport, now: DateTime<Utc>) -> Option<Self> {
    let hourly = report.hourly.as_ref()?;
    let hour = now.format("%Y-%m-%dT%H").to_string();
    let idx = hourly
      .time
      .iter()
      .position(|t| t.starts_with(&hour))
      .or_else(|| hourly.time.len().checked_sub(1));

    let at = |series: &[Option<f64>]| idx.and_then(|i| series.get(i).copied().flatten());
    let pm25 = at(&hourly.pm2_5[..]);
    let pm10 = at(&hourly.pm10[..]);
    let aqi = at(&hourly.us_aqi[..]).or_else(|| pm25.map(pm25_to_us_aqi));

    let (label, advice) = match aqi {
      Some(aqi) => (aqi_label(aqi), aqi_advice(aqi)),
      None => ("No AQI", "Air quality data unavailable."),
    };

    Some(Self {
      aqi: aqi.map(round),
      label,
      advice,
      pm25: pm25.map(round1),
      pm10: pm10.map(round1),
    })
  }
}

pub fn aqi_label(aqi: f64) -> &'static str {
  match aqi {
    a if a <= 50.0 => "Good",
    a if a <= 100.0 => "Moderate",
    a if a <= 150.0 => "Unhealthy for sensitive groups",
    a if a <= 200.0 => "Unhealthy",
    a if a <= 300.0 => "Very Unhealthy",
    _ => "Hazardous",
  }
}

pub fn aqi_advice(aqi: f64) -> &'static str {
  match aqi {
    a if a <= 50.0 => "Air quality is good.",
    a if a <= 100.0 => "Moderate - sensitive people may notice effects.",
    a if a <= 150.0 => "Sensitive groups should reduce prolonged exertion.",
    a if a <= 200.0 => "Limit outdoor activities.",
    a if a <= 300.0 => "Avoid outdoor exertion.",
    _ => "Serious health risk - follow official guidance.",
  }
}

/// Piecewise-linear US AQI approximation from a PM2.5 concentration (µg/m³).
pub fn pm25_to_us_aqi(pm: f64) -> f64 {
  if pm <= 12.0 {
    (50.0 / 12.0) * pm
  } else if pm <= 35.4 {
    50.0 + ((100.0 - 50.0) / (35.4 - 12.1)) * (pm - 12.1)
  } else if pm <= 55.4 {
    100.0 + ((150.0 - 100.0) / (55.4 - 35.5)) * (pm - 35.5)
  } else if pm <= 150.4 {
    150.0 + ((200.0 - 150.0) / (150.4 - 55.5)) * (pm - 55.5)
  } else {
    300.0 + (pm - 150.5) * 1.5
  }
}

// ============================================================================
// Holidays
// ============================================================================

/// Holidays on or after `today`, at most eight. The error is the message to show.
pub fn upcoming_holidays(list: Vec<Holiday>, today: NaiveDate) -> Result<Vec<Holiday>, String> {
  if list.is_empty() {
    return Err("No holidays found for this year.".to_string());
  }

  let today = today.format("%Y-%m-%d").to_string();
  let upcoming: Vec<Holiday> = list
    .into_iter()
    .filter(|h| h.date >= today)
    .take(MAX_HOLIDAYS)
    .collect();

  if upcoming.is_empty() {
    Err("No more holidays this year.".to_string())
  } else {
    Ok(upcoming)
  }
}
