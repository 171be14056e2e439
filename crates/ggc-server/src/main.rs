//! ggc-server binary.
//!
//! Loads [`ServerConfig`] from `config.toml` (or `--config`) and `GGC_*`
//! environment variables, opens the SQLite store and serves the JSON API
//! under `/api`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use ggc_server::ServerConfig;
use ggc_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Global Grant Community assessment server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Keep everything in memory instead of opening `store_path`.
  #[arg(long)]
  in_memory: bool,
}

async fn open_store(cfg: &ServerConfig, in_memory: bool) -> anyhow::Result<SqliteStore> {
  if in_memory {
    tracing::warn!("using an in-memory store; data is lost on exit");
    return SqliteStore::open_in_memory()
      .await
      .context("failed to open in-memory store");
  }
  let path = cfg.resolved_store_path();
  let store = SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))?;
  tracing::info!(path = %path.display(), "opened store");
  Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

  let store = open_store(&cfg, cli.in_memory).await?;
  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  tracing::info!("Listening on http://{address}");
  axum::serve(listener, ggc_server::app(Arc::new(store)))
    .await
    .context("server error")
}
