//! Offline worker: intercepts outbound requests at the transport boundary.
//!
//! The worker knows nothing about the dashboard. It owns two generation-tagged
//! cache partitions and applies, per request:
//! - API class: network first, cached copy or a synthesized error payload as fallback
//! - static class: cache first, network second, offline page for navigations
//!
//! Lifecycle: `Installing -> Activating -> Active`, and `Redundant` once superseded.
//! Only an `Active` worker intercepts anything.

mod classify;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use reqwest::StatusCode;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::config::Config;
use crate::error::TransportError;
use crate::net::{Destination, Request, Response, ResponseSource, Transport};

pub use classify::{Classifier, RequestClass};

/// Version label for the cache partitions of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation(String);

impl Generation {
  pub fn new(tag: impl Into<String>) -> Self {
    Self(tag.into())
  }

  pub fn tag(&self) -> &str {
    &self.0
  }

  pub fn static_partition(&self) -> String {
    format!("static-{}", self.0)
  }

  pub fn api_partition(&self) -> String {
    format!("api-{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  Activating,
  Active,
  /// Superseded by a newer worker; passes everything through
  Redundant,
}

/// Notifications from the worker to whoever is listening (the dashboard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
  Installed { cached: usize, failed: usize },
  Activated { generation: String, removed: Vec<String> },
  /// An API request failed and was answered from the API partition
  ServedFromCache { url: String },
  /// Nothing cached either: offline page, synthesized error or empty 504
  OfflineFallback { url: String },
}

/// Outcome of pre-caching the static asset manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
  pub cached: usize,
  pub failed: Vec<String>,
}

/// Static configuration of a worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
  pub generation: Generation,
  /// Origin the app shell is served from; manifest paths resolve against it
  pub origin: Option<Url>,
  pub static_assets: Vec<String>,
  pub offline_page: String,
  pub classifier: Classifier,
}

impl WorkerSettings {
  pub fn from_config(config: &Config) -> Result<Self> {
    let origin = config
      .origin
      .as_deref()
      .map(|o| Url::parse(o).map_err(|e| eyre!("Invalid origin '{}': {}", o, e)))
      .transpose()?;

    Ok(Self {
      generation: Generation::new(config.generation.clone()),
      origin,
      static_assets: config.worker.static_assets.clone(),
      offline_page: config.worker.offline_page.clone(),
      classifier: Classifier::new(
        config.worker.api_prefix.clone(),
        config.worker.api_hosts.clone(),
      ),
    })
  }

  /// Absolute URL of a root-relative app-shell path. Without an origin the
  /// path is used as is.
  fn resolve(&self, path: &str) -> String {
    match &self.origin {
      Some(origin) => origin
        .join(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string()),
      None => path.to_string(),
    }
  }
}

pub struct OfflineWorker<S: CacheStorage> {
  inner: Arc<dyn Transport>,
  storage: Arc<S>,
  settings: WorkerSettings,
  state: RwLock<WorkerState>,
  events: Option<mpsc::UnboundedSender<WorkerEvent>>,
}

impl<S: CacheStorage> OfflineWorker<S> {
  pub fn new(inner: Arc<dyn Transport>, storage: Arc<S>, settings: WorkerSettings) -> Self {
    Self {
      inner,
      storage,
      settings,
      state: RwLock::new(WorkerState::Installing),
      events: None,
    }
  }

  /// Send lifecycle and fallback notifications to `tx`.
  pub fn with_events(mut self, tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
    self.events = Some(tx);
    self
  }

  pub fn state(&self) -> WorkerState {
    self
      .state
      .read()
      .map(|s| *s)
      .unwrap_or(WorkerState::Redundant)
  }

  pub fn generation(&self) -> &Generation {
    &self.settings.generation
  }

  fn set_state(&self, state: WorkerState) {
    if let Ok(mut current) = self.state.write() {
      debug!(from = ?*current, to = ?state, "worker state change");
      *current = state;
    }
  }

  fn notify(&self, event: WorkerEvent) {
    if let Some(tx) = &self.events {
      // Nobody listening is fine
      let _ = tx.send(event);
    }
  }

  /// Install, skip waiting, and activate.
  pub async fn register(&self) -> Result<InstallReport> {
    let report = self.install().await;
    self.activate()?;
    Ok(report)
  }

  /// Pre-cache the static asset manifest into this generation's static partition.
  ///
  /// Individual failures are logged and skipped. The worker does not wait for
  /// older workers to go away: it moves straight on to `Activating`.
  pub async fn install(&self) -> InstallReport {
    self.set_state(WorkerState::Installing);

    let partition = self.settings.generation.static_partition();
    if let Err(e) = self.storage.open(&partition) {
      warn!(partition = %partition, error = %e, "failed to open static partition");
    }

    let requests: Vec<(String, Request)> = self
      .settings
      .static_assets
      .iter()
      .map(|path| {
        let request = Request::get(self.settings.resolve(path))
          .with_destination(Destination::from_path(path));
        (path.clone(), request)
      })
      .collect();

    let results = join_all(requests.iter().map(|(_, request)| self.inner.send(request))).await;

    let mut report = InstallReport::default();
    for ((path, request), result) in requests.iter().zip(results) {
      let stored = match result {
        Ok(response) if response.is_success() => self
          .storage
          .put(&partition, request, &response)
          .map_err(|e| e.to_string()),
        Ok(response) => Err(format!("status {}", response.status)),
        Err(e) => Err(e.to_string()),
      };

      match stored {
        Ok(()) => report.cached += 1,
        Err(reason) => {
          warn!(path = %path, reason = %reason, "failed to pre-cache static asset");
          report.failed.push(path.clone());
        }
      }
    }

    info!(
      cached = report.cached,
      failed = report.failed.len(),
      "worker installed"
    );
    self.set_state(WorkerState::Activating);
    self.notify(WorkerEvent::Installed {
      cached: report.cached,
      failed: report.failed.len(),
    });

    report
  }

  /// Delete every partition that does not belong to this generation, then
  /// take control immediately. Returns the names of deleted partitions.
  pub fn activate(&self) -> Result<Vec<String>> {
    if self.state() == WorkerState::Redundant {
      return Err(eyre!("Worker has been superseded and cannot activate"));
    }

    let keep = [
      self.settings.generation.static_partition(),
      self.settings.generation.api_partition(),
    ];

    let mut removed = Vec::new();
    for name in self.storage.partitions()? {
      if !keep.contains(&name) {
        self.storage.delete_partition(&name)?;
        removed.push(name);
      }
    }

    info!(generation = self.settings.generation.tag(), ?removed, "worker activated");
    self.set_state(WorkerState::Active);
    self.notify(WorkerEvent::Activated {
      generation: self.settings.generation.tag().to_string(),
      removed: removed.clone(),
    });

    Ok(removed)
  }

  /// Stop intercepting; a newer worker has taken over.
  pub fn retire(&self) {
    self.set_state(WorkerState::Redundant);
  }

  /// Intercept a request. `None` means "not handled": the caller should send
  /// it over the network itself.
  pub async fn handle_fetch(&self, request: &Request) -> Option<Response> {
    if self.state() != WorkerState::Active {
      return None;
    }

    match self.settings.classifier.classify(request)? {
      RequestClass::Api => Some(self.network_first(request).await),
      RequestClass::Static => Some(self.cache_first(request).await),
    }
  }

  async fn network_first(&self, request: &Request) -> Response {
    let partition = self.settings.generation.api_partition();

    match self.inner.send(request).await {
      Ok(response) => {
        if response.is_success() {
          if let Err(e) = self.storage.put(&partition, request, &response) {
            warn!(url = request.url(), error = %e, "failed to cache API response");
          }
        }
        response
      }
      Err(err) => {
        debug!(url = request.url(), error = %err, "API request failed, checking cache");
        match self.storage.match_in(&partition, request) {
          Ok(Some(cached)) => {
            self.notify(WorkerEvent::ServedFromCache {
              url: request.url().to_string(),
            });
            cached.response
          }
          result => {
            if let Err(e) = result {
              warn!(url = request.url(), error = %e, "cache read error");
            }
            self.notify(WorkerEvent::OfflineFallback {
              url: request.url().to_string(),
            });
            offline_payload()
          }
        }
      }
    }
  }

  async fn cache_first(&self, request: &Request) -> Response {
    let partition = self.settings.generation.static_partition();

    match self.storage.match_in(&partition, request) {
      Ok(Some(cached)) => return cached.response,
      Ok(None) => {}
      Err(e) => warn!(url = request.url(), error = %e, "cache read error"),
    }

    match self.inner.send(request).await {
      Ok(response) => {
        if response.is_success() && request.destination().is_shell_asset() {
          if let Err(e) = self.storage.put(&partition, request, &response) {
            warn!(url = request.url(), error = %e, "failed to cache static response");
          }
        }
        response
      }
      Err(err) => {
        debug!(url = request.url(), error = %err, "static request failed");
        self.notify(WorkerEvent::OfflineFallback {
          url: request.url().to_string(),
        });

        if request.is_navigation() {
          let offline = Request::navigate(self.settings.resolve(&self.settings.offline_page));
          if let Ok(Some(page)) = self.storage.match_in(&partition, &offline) {
            return page.response;
          }
        }

        gateway_unavailable()
      }
    }
  }
}

#[async_trait]
impl<S: CacheStorage + 'static> Transport for OfflineWorker<S> {
  async fn send(&self, request: &Request) -> Result<Response, TransportError> {
    match self.handle_fetch(request).await {
      Some(response) => Ok(response),
      None => self.inner.send(request).await,
    }
  }
}

/// Well-formed error body for API requests that cannot be answered at all.
fn offline_payload() -> Response {
  Response::json(
    StatusCode::SERVICE_UNAVAILABLE,
    &serde_json::json!({ "error": "offline-or-no-cache" }),
  )
  .with_source(ResponseSource::Synthesized)
}

fn gateway_unavailable() -> Response {
  Response::empty(StatusCode::GATEWAY_TIMEOUT).with_source(ResponseSource::Synthesized)
}
