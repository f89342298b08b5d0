//! Request descriptors and response payloads exchanged at the transport seam.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  /// Data requests, manifests, fonts, ...
  #[default]
  Other,
}

impl Destination {
  /// Guess the destination of an app-shell path from its extension.
  pub fn from_path(path: &str) -> Self {
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    let file = path.rsplit('/').next().unwrap_or("");

    match file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
      None => Self::Document,
      Some(ext) => match ext.as_str() {
        "html" | "htm" => Self::Document,
        "js" | "mjs" => Self::Script,
        "css" => Self::Style,
        "svg" | "png" | "jpg" | "jpeg" | "gif" | "webp" | "ico" => Self::Image,
        _ => Self::Other,
      },
    }
  }

  /// Resource kinds the worker may opportunistically keep in the static partition.
  pub fn is_shell_asset(self) -> bool {
    matches!(
      self,
      Self::Document | Self::Script | Self::Style | Self::Image
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// Top-level page navigation
  Navigate,
  #[default]
  Fetch,
}

/// An outbound request. The method and the URL string, exactly as issued,
/// identify it in the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  method: Method,
  url: String,
  destination: Destination,
  mode: RequestMode,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: Method::GET,
      url: url.into(),
      destination: Destination::Other,
      mode: RequestMode::Fetch,
    }
  }

  /// A page navigation to `url`.
  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      destination: Destination::Document,
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn method(&self) -> &Method {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn destination(&self) -> Destination {
    self.destination
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  Network,
  /// Read back from a cache partition
  Cache,
  /// Made up by the worker because nothing better was available
  Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: StatusCode,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
  pub source: ResponseSource,
}

impl Response {
  pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      content_type: None,
      body: body.into(),
      source: ResponseSource::Network,
    }
  }

  pub fn empty(status: StatusCode) -> Self {
    Self::new(status, Vec::new())
  }

  pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
    Self::new(status, value.to_string()).with_content_type("application/json")
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }

  pub fn with_source(mut self, source: ResponseSource) -> Self {
    self.source = source;
    self
  }

  pub fn is_success(&self) -> bool {
    self.status.is_success()
  }

  pub fn from_cache(&self) -> bool {
    self.source == ResponseSource::Cache
  }

  /// Decode the body as JSON.
  pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
    serde_json::from_slice(&self.body).map_err(|e| TransportError::Parse(e.to_string()))
  }
}
