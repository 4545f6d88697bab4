//! HTTP server wiring for provgraph.
//!
//! Serves the JSON API from [`provgraph_api`] and accepts collector
//! documents on `POST /documents`, handing them to the in-process
//! [`pipeline`] for asynchronous ingestion.

pub mod error;
pub mod pipeline;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
  routing::post,
};
use provgraph_core::{
  dispatch::DEFAULT_CONCURRENCY,
  document::{Document, IngestRequest},
  store::GraphStore,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pipeline::Emitter;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PROVGRAPH_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Items of one batch ingestion in flight at once.
  pub batch_concurrency: usize,
  /// Capacity of the collector document queue.
  pub document_queue:    usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_string(),
      port:              8080,
      store_path:        PathBuf::from("~/.local/share/provgraph/graph.db"),
      batch_concurrency: DEFAULT_CONCURRENCY,
      document_queue:    1024,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: documents, API, and request tracing.
pub fn router<S>(store: Arc<S>, emitter: Emitter) -> Router
where
  S: GraphStore + 'static,
{
  Router::new()
    .route("/documents", post(publish_document))
    .with_state(emitter)
    .merge(provgraph_api::router(store))
    .layer(TraceLayer::new_for_http())
}

/// A document as submitted by a collector. The id is assigned on receipt
/// when absent.
#[derive(Debug, Deserialize)]
pub struct DocumentBody {
  #[serde(default)]
  pub id:        Option<Uuid>,
  pub collector: String,
  #[serde(default)]
  pub source:    String,
  pub request:   IngestRequest,
}

/// `POST /documents`: queue a document and answer 202 with its id.
async fn publish_document(
  State(emitter): State<Emitter>,
  body: Result<Json<DocumentBody>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
  let Json(body) = body?;
  let mut document = Document::new(body.collector, body.source, body.request);
  if let Some(id) = body.id {
    document.id = id;
  }
  emitter.publish(&document).await?;
  Ok((StatusCode::ACCEPTED, Json(json!({ "id": document.id }))))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request};
  use provgraph_store_sqlite::SqliteStore;
  use tokio_util::sync::CancellationToken;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn config_defaults_fill_missing_fields() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str("port = 9000", config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.batch_concurrency, DEFAULT_CONCURRENCY);
    assert_eq!(cfg.document_queue, 1024);
  }

  #[tokio::test]
  async fn posted_document_is_accepted_and_ingested() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (emitter, subscriber) = pipeline::channel(8);

    let body = json!({
      "collector": "deps.dev",
      "source": "https://deps.dev/pypi/requests",
      "request": { "kind": "package", "type": "pypi", "name": "requests", "version": "2.31.0" },
    });
    let req = Request::builder()
      .method("POST")
      .uri("/documents")
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let resp = router(store.clone(), emitter).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    // The router, and with it the only emitter, is gone: the subscriber
    // drains the queue and stops.
    let delivery = subscriber.run(store.clone(), CancellationToken::new()).await;
    assert_eq!(delivery.applied, 1);
    let nodes = store.packages(None).await.unwrap();
    assert_eq!(nodes[0].purl(), "pkg:pypi/requests@2.31.0");
  }

  #[tokio::test]
  async fn malformed_document_is_bad_request() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (emitter, _subscriber) = pipeline::channel(8);

    let req = Request::builder()
      .method("POST")
      .uri("/documents")
      .header("content-type", "application/json")
      .body(Body::from(r#"{"collector":"x","request":{"kind":"teleport"}}"#))
      .unwrap();
    let resp = router(store, emitter).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn api_routes_are_mounted() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (emitter, _subscriber) = pipeline::channel(8);

    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router(store, emitter).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
