//! Plain-text rendering of dashboard sections, shared by the TUI panels and
//! `--plain` output.

use crate::dashboard::summary::{AirQualitySummary, Section, WeatherSummary};
use crate::dashboard::Snapshot;
use crate::upstream::types::Holiday;

pub fn weather_lines(weather: &WeatherSummary) -> Vec<String> {
  let Some(current) = &weather.current else {
    return vec!["No current weather".to_string()];
  };

  let high_low = weather
    .high_low
    .map(|(max, min)| format!("{}° / {}°", max, min))
    .unwrap_or_else(|| "- / -".to_string());

  vec![
    format!("{}°C  {}", current.temperature, current.description),
    format!("Wind      {} km/h", current.wind),
    format!("High/Low  {}", high_low),
    format!("Precip    {} mm", weather.precipitation),
  ]
}

pub fn alerts_line(weather: &WeatherSummary) -> Option<String> {
  if weather.alerts.is_empty() {
    None
  } else {
    Some(weather.alerts.join(" • "))
  }
}

pub fn forecast_lines(weather: &WeatherSummary) -> Vec<String> {
  weather
    .forecast
    .iter()
    .map(|day| {
      let temp = |t: Option<i64>| t.map(|t| format!("{}°", t)).unwrap_or_else(|| "-°".to_string());
      format!(
        "{:<6} {:>4} {:>4}  {:>5}mm  {}",
        day.label,
        temp(day.max),
        temp(day.min),
        day.precipitation,
        day
          .code
          .map(crate::dashboard::summary::describe_weather)
          .unwrap_or("-")
      )
    })
    .collect()
}

pub fn air_quality_lines(section: &Section<AirQualitySummary>) -> Vec<String> {
  let aq = match section {
    Section::Ready(aq) => aq,
    Section::Unavailable(message) => return vec![message.clone()],
  };

  let value = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());

  vec![
    format!(
      "AQI {}  {}",
      aq.aqi.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
      aq.label
    ),
    aq.advice.to_string(),
    format!("PM2.5 {}  PM10 {}", value(aq.pm25), value(aq.pm10)),
  ]
}

pub fn holiday_lines(section: &Section<Vec<Holiday>>) -> Vec<String> {
  match section {
    Section::Ready(list) => list
      .iter()
      .map(|h| {
        if h.local_name == h.name {
          format!("{}  {}", h.date, h.local_name)
        } else {
          format!("{}  {} ({})", h.date, h.local_name, h.name)
        }
      })
      .collect(),
    Section::Unavailable(message) => vec![message.clone()],
  }
}

/// The whole dashboard as text, one section after the other.
pub fn snapshot_lines(snapshot: &Snapshot, last_updated: &str, offline: bool) -> Vec<String> {
  let mut lines = vec![snapshot.location.clone()];
  lines.push(if offline {
    format!("OFFLINE - showing cached data. Last updated: {}", last_updated)
  } else {
    format!("Last updated: {}", last_updated)
  });

  let mut section = |title: &str, body: Vec<String>| {
    lines.push(String::new());
    lines.push(format!("== {} ==", title));
    lines.extend(body);
  };

  let mut weather = weather_lines(&snapshot.weather);
  if let Some(alerts) = alerts_line(&snapshot.weather) {
    weather.push(format!("! {}", alerts));
  }
  section("Weather", weather);
  section("Air quality", air_quality_lines(&snapshot.air_quality));
  section("Forecast", forecast_lines(&snapshot.weather));
  section("Holidays", holiday_lines(&snapshot.holidays));

  lines
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dashboard::summary::{CurrentConditions, ForecastDay};

  fn weather() -> WeatherSummary {
    WeatherSummary {
      current: Some(CurrentConditions {
        temperature: 18,
        code: 1,
        description: "Mainly clear",
        wind: 11,
      }),
      high_low: Some((21, 12)),
      precipitation: 0.4,
      forecast: vec![ForecastDay {
        label: "Today".to_string(),
        code: Some(1),
        max: Some(21),
        min: None,
        precipitation: 0.4,
      }],
      alerts: vec!["Heavy rain Mon 19 Oct".to_string(), "Snow Tue 20 Oct".to_string()],
    }
  }

  #[test]
  fn test_weather_lines() {
    let lines = weather_lines(&weather());
    assert_eq!(lines[0], "18°C  Mainly clear");
    assert_eq!(lines[2], "High/Low  21° / 12°");
    assert_eq!(lines[3], "Precip    0.4 mm");
    assert_eq!(
      alerts_line(&weather()).as_deref(),
      Some("Heavy rain Mon 19 Oct • Snow Tue 20 Oct")
    );
  }

  #[test]
  fn test_forecast_line_with_missing_low() {
    let lines = forecast_lines(&weather());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Today"));
    assert!(lines[0].contains("21°"));
    assert!(lines[0].contains("-°"));
    assert!(lines[0].ends_with("Mainly clear"));
  }

  #[test]
  fn test_unavailable_sections_show_their_message() {
    assert_eq!(
      air_quality_lines(&Section::unavailable("Air quality unavailable")),
      vec!["Air quality unavailable".to_string()]
    );
    assert_eq!(
      holiday_lines(&Section::unavailable("No more holidays this year.")),
      vec!["No more holidays this year.".to_string()]
    );
  }

  #[test]
  fn test_holiday_line_shows_both_names() {
    let lines = holiday_lines(&Section::Ready(vec![
      Holiday {
        date: "2026-12-25".to_string(),
        local_name: "Christmas Day".to_string(),
        name: "Christmas Day".to_string(),
      },
      Holiday {
        date: "2026-12-26".to_string(),
        local_name: "Zweiter Weihnachtstag".to_string(),
        name: "St. Stephen's Day".to_string(),
      },
    ]));

    assert_eq!(lines[0], "2026-12-25  Christmas Day");
    assert_eq!(lines[1], "2026-12-26  Zweiter Weihnachtstag (St. Stephen's Day)");
  }
}
