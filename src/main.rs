use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use quicklook::app::{self, App};
use quicklook::config::Config;
use quicklook::dashboard::location::{FixedLocator, Locator, NoLocator};
use quicklook::logging;
use quicklook::runtime::Runtime;
use quicklook::upstream::Coordinates;

#[derive(Parser, Debug)]
#[command(name = "quicklook")]
#[command(about = "Weather, air quality and holidays for where you are, online or not")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/quicklook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Latitude of the device position
  #[arg(long, requires = "lon", allow_hyphen_values = true)]
  lat: Option<f64>,

  /// Longitude of the device position
  #[arg(long, requires = "lat", allow_hyphen_values = true)]
  lon: Option<f64>,

  /// Place name or "lat,lon" used when no position can be determined
  #[arg(short, long)]
  place: Option<String>,

  /// Print the dashboard once instead of starting the terminal UI
  #[arg(long)]
  plain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(&logging::default_log_dir()?)?;

  let config = Config::load(args.config.as_deref())?;

  // Command line position wins over the configured one
  let position = match (args.lat, args.lon) {
    (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
    _ => config
      .location
      .map(|l| Coordinates::new(l.latitude, l.longitude)),
  };
  let locator: Arc<dyn Locator> = match position {
    Some(at) => Arc::new(FixedLocator(at)),
    None => Arc::new(NoLocator),
  };

  let runtime = Runtime::start(&config, locator).await?;

  if args.plain {
    return app::run_plain(runtime, args.place.as_deref()).await;
  }

  let mut app = App::new(runtime, args.place);
  app.run().await?;

  Ok(())
}
