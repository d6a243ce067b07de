mod app;
mod cache;
mod commands;
mod config;
mod debounce;
mod event;
mod loader;
mod logging;
mod source;
mod ui;
mod visibility;
mod window;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "opsdeck")]
#[command(about = "A terminal dashboard for marketing-operations tables, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/opsdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Resource to open at startup
  #[arg(short, long)]
  resource: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Flushes the log file on exit
  let _log_guard = logging::init()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override startup resource if specified on command line
  let config = if let Some(resource) = args.resource {
    config::Config {
      default_resource: Some(resource),
      ..config
    }
  } else {
    config
  };

  info!(url = %config.source.url, resources = config.resources.len(), "starting");

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
