use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Cache generation tag; bumping it retires every older cache partition
  pub generation: String,
  /// Origin the app shell is served from (e.g. "http://localhost:8080")
  pub origin: Option<String>,
  /// Network timeout per upstream request, in seconds
  pub timeout_secs: u64,
  /// SQLite cache file (defaults to the user data directory)
  pub cache_path: Option<PathBuf>,
  pub worker: WorkerConfig,
  pub providers: ProvidersConfig,
  /// Fixed device position; when unset the IP lookup is used
  pub location: Option<LocationConfig>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      generation: "v1".to_string(),
      origin: None,
      timeout_secs: 10,
      cache_path: None,
      worker: WorkerConfig::default(),
      providers: ProvidersConfig::default(),
      location: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  pub enabled: bool,
  /// Same-origin path prefix treated as API traffic
  pub api_prefix: String,
  /// Upstream hosts treated as API traffic (subdomains included)
  pub api_hosts: Vec<String>,
  pub offline_page: String,
  /// App-shell paths pre-cached on install
  pub static_assets: Vec<String>,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      api_prefix: "/api/".to_string(),
      api_hosts: [
        "open-meteo.com",
        "air-quality-api.open-meteo.com",
        "date.nager.at",
        "ipapi.co",
        "nominatim.openstreetmap.org",
      ]
      .map(String::from)
      .to_vec(),
      offline_page: "/offline.html".to_string(),
      static_assets: [
        "/",
        "/index.html",
        "/styles.css",
        "/script.js",
        "/manifest.webmanifest",
        "/offline.html",
        "/icons/icon-192.svg",
        "/icons/icon-512.svg",
      ]
      .map(String::from)
      .to_vec(),
    }
  }
}

/// Base URLs of the upstream data providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
  pub weather: String,
  pub air_quality: String,
  pub geocode: String,
  pub holidays: String,
  pub ip_location: String,
}

impl Default for ProvidersConfig {
  fn default() -> Self {
    Self {
      weather: "https://api.open-meteo.com/v1/forecast".to_string(),
      air_quality: "https://air-quality-api.open-meteo.com/v1/air-quality".to_string(),
      geocode: "https://nominatim.openstreetmap.org".to_string(),
      holidays: "https://date.nager.at/api/v3/PublicHolidays".to_string(),
      ip_location: "https://ipapi.co/json/".to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct LocationConfig {
  pub latitude: f64,
  pub longitude: f64,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./quicklook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/quicklook/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("quicklook.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("quicklook").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    if config.generation.trim().is_empty() {
      return Err(eyre!(
        "Invalid config file {}: generation must not be empty",
        path.display()
      ));
    }

    Ok(config)
  }

  pub fn timeout(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.timeout_secs.max(1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let file = write_config(
      "generation: v7\n\
       origin: http://localhost:8080\n\
       worker:\n  api_prefix: /data/\n\
       location:\n  latitude: 51.5\n  longitude: -0.12\n",
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.generation, "v7");
    assert_eq!(config.origin.as_deref(), Some("http://localhost:8080"));
    assert_eq!(config.worker.api_prefix, "/data/");
    assert!(config.worker.enabled);
    assert_eq!(config.worker.offline_page, "/offline.html");
    assert_eq!(config.worker.static_assets.len(), 8);
    assert_eq!(config.providers.ip_location, "https://ipapi.co/json/");
    assert_eq!(
      config.location,
      Some(LocationConfig {
        latitude: 51.5,
        longitude: -0.12
      })
    );
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_invalid_yaml_is_an_error() {
    let file = write_config("timeout_secs: [1, 2\n");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
  }

  #[test]
  fn test_empty_generation_is_rejected() {
    let file = write_config("generation: \"  \"\n");
    assert!(Config::load(Some(file.path())).is_err());
  }

  #[test]
  fn test_timeout_is_at_least_one_second() {
    let config = Config {
      timeout_secs: 0,
      ..Config::default()
    };
    assert_eq!(config.timeout(), std::time::Duration::from_secs(1));
  }
}
