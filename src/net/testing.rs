//! In-process transport used by tests to script upstream answers and outages.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Request, Response, Transport};
use crate::error::TransportError;

pub struct ScriptedTransport {
  routes: Mutex<HashMap<String, Response>>,
  online: AtomicBool,
  requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self {
      routes: Mutex::new(HashMap::new()),
      online: AtomicBool::new(true),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn route(&self, url: impl Into<String>, response: Response) {
    self.routes.lock().unwrap().insert(url.into(), response);
  }

  pub fn json(&self, url: impl Into<String>, value: serde_json::Value) {
    self.route(url, Response::json(StatusCode::OK, &value));
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  /// Number of requests that reached this transport for `url`.
  pub fn hits(&self, url: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|u| u.as_str() == url)
      .count()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: &Request) -> Result<Response, TransportError> {
    self
      .requests
      .lock()
      .unwrap()
      .push(request.url().to_string());

    if !self.online.load(Ordering::SeqCst) {
      return Err(TransportError::Network("offline".to_string()));
    }

    let routes = self.routes.lock().unwrap();
    Ok(
      routes
        .get(request.url())
        .cloned()
        .unwrap_or_else(|| Response::empty(StatusCode::NOT_FOUND)),
    )
  }
}
