//! Wires storage, transports, the offline worker and the dashboard together.

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::cache::{FetchCache, SqliteStorage};
use crate::config::Config;
use crate::dashboard::location::Locator;
use crate::dashboard::Dashboard;
use crate::net::{HttpTransport, Transport};
use crate::upstream::{Endpoints, UpstreamClient};
use crate::worker::{Generation, OfflineWorker, WorkerEvent, WorkerSettings, WorkerState};

pub struct Runtime {
  pub dashboard: Arc<Dashboard<SqliteStorage>>,
  pub cache: Arc<FetchCache<SqliteStorage>>,
  pub worker: Option<Arc<OfflineWorker<SqliteStorage>>>,
  /// Taken by whoever displays worker notifications
  pub worker_events: Option<mpsc::UnboundedReceiver<WorkerEvent>>,
}

impl Runtime {
  /// Open the cache, register the worker (if enabled) and build the dashboard.
  pub async fn start(config: &Config, locator: Arc<dyn Locator>) -> Result<Self> {
    let path = match &config.cache_path {
      Some(path) => path.clone(),
      None => SqliteStorage::default_path()?,
    };
    let storage = Arc::new(SqliteStorage::open_at(&path)?);
    info!(path = %path.display(), "cache opened");

    Self::with_storage(config, storage, locator).await
  }

  pub async fn with_storage(
    config: &Config,
    storage: Arc<SqliteStorage>,
    locator: Arc<dyn Locator>,
  ) -> Result<Self> {
    let http: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.timeout())?);
    let generation = Generation::new(config.generation.clone());

    let (transport, worker, worker_events) = if config.worker.enabled {
      let mut settings = WorkerSettings::from_config(config)?;
      if settings.origin.is_none() {
        info!("no app-shell origin configured, skipping static pre-cache");
        settings.static_assets.clear();
      }

      let (tx, rx) = mpsc::unbounded_channel();
      let worker = Arc::new(OfflineWorker::new(http, storage.clone(), settings).with_events(tx));
      worker.register().await?;

      let transport: Arc<dyn Transport> = worker.clone();
      (transport, Some(worker), Some(rx))
    } else {
      info!("offline worker disabled");
      (http, None, None)
    };

    let cache = Arc::new(FetchCache::new(
      transport,
      storage,
      generation.api_partition(),
    ));
    let client = UpstreamClient::new(
      cache.clone(),
      Endpoints::new(config.providers.clone()),
    );
    let dashboard = Arc::new(Dashboard::new(client, locator));

    Ok(Self {
      dashboard,
      cache,
      worker,
      worker_events,
    })
  }

  pub fn worker_state(&self) -> Option<WorkerState> {
    self.worker.as_ref().map(|w| w.state())
  }
}
