//! provgraph server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered
//! under `PROVGRAPH_*` environment variables, opens an in-process SQLite
//! store, starts the document subscriber, and serves the API over HTTP.
//!
//! ```sh
//! cargo run -p provgraph-server -- --in-memory
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use provgraph_server::{ServerConfig, pipeline};
use provgraph_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "provgraph ingestion and query server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Use an ephemeral in-memory store instead of `store_path`.
  #[arg(long)]
  in_memory: bool,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PROVGRAPH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = if cli.in_memory {
    tracing::info!("using in-memory store");
    SqliteStore::open_in_memory()
      .await
      .context("failed to open in-memory store")?
  } else {
    let store_path = expand_tilde(&server_cfg.store_path);
    if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {parent:?}"))?;
    }
    tracing::info!(path = ?store_path, "opening store");
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?
  };

  let shutdown = CancellationToken::new();
  let store = Arc::new(
    store
      .with_cancellation(shutdown.clone())
      .with_batch_concurrency(server_cfg.batch_concurrency),
  );

  let (emitter, subscriber) = pipeline::channel(server_cfg.document_queue);
  let mut ingest = tokio::spawn(subscriber.run(store.clone(), shutdown.clone()));

  let app = provgraph_server::router(store, emitter);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router held the only emitter, so the subscriber now drains what is
  // queued and stops. A second ctrl-c abandons the queue.
  tracing::info!("http server stopped, draining document queue");
  let delivery = tokio::select! {
    joined = &mut ingest => joined.context("document subscriber panicked")?,
    _ = shutdown_signal() => {
      shutdown.cancel();
      ingest.await.context("document subscriber panicked")?
    }
  };
  tracing::info!(applied = delivery.applied, skipped = delivery.skipped, "shutdown complete");

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
