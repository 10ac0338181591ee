mod api;
mod app;
mod cache;
mod commands;
mod config;
mod db;
mod import;
mod profit;
mod render;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "craftbench")]
#[command(about = "Crafting profitability calculator for auction-house economies")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/craftbench/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// User whose prices and favorites are used
  #[arg(short, long, global = true)]
  user: Option<String>,

  /// Log debug output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

/// Logs go to stderr, and also to a daily file when `log_dir` is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(verbose: bool, log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
  let default_level = if verbose { "craftbench=debug" } else { "craftbench=info" };
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "craftbench.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(env_filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _guard = init_tracing(args.verbose, config.log_dir.as_ref());

  let mut app = app::App::new(config, args.user)?;
  let output = app.run(args.command).await?;
  print!("{}", output);

  Ok(())
}
