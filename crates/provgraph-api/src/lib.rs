//! JSON REST API for provgraph.
//!
//! Exposes an axum [`Router`] backed by any [`GraphStore`]. Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = provgraph_api::router(Arc::new(store));
//! ```

pub mod analysis;
pub mod error;
pub mod nodes;
pub mod relations;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::rejection::JsonRejection,
  routing::{get, post},
};
use provgraph_core::store::GraphStore;

pub use error::ApiError;

/// A JSON body whose rejection is reported as an [`ApiError`].
pub(crate) type Body<T> = Result<Json<T>, JsonRejection>;

/// The health, query and analysis surface plus the JSON API nested under
/// `/api`.
pub fn router<S>(store: Arc<S>) -> Router<()>
where
  S: GraphStore + 'static,
{
  Router::new()
    .route("/healthz", get(analysis::healthz))
    .route("/query/dependencies", get(analysis::query_dependencies::<S>))
    .route("/analysis/dependencies", get(analysis::analyze_dependencies::<S>))
    .with_state(store.clone())
    .nest("/api", api_router(store))
}

/// Ingestion and query endpoints for every node and relation kind.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: GraphStore + 'static,
{
  Router::new()
    // Identity tree
    .route("/packages", get(nodes::list_packages::<S>).post(nodes::ingest_package::<S>))
    .route("/packages/batch", post(nodes::ingest_packages::<S>))
    .route("/packages/query", post(nodes::query_packages::<S>))
    .route("/sources", get(nodes::list_sources::<S>).post(nodes::ingest_source::<S>))
    .route("/sources/batch", post(nodes::ingest_sources::<S>))
    .route("/sources/query", post(nodes::query_sources::<S>))
    .route("/artifacts", get(nodes::list_artifacts::<S>).post(nodes::ingest_artifact::<S>))
    .route("/artifacts/batch", post(nodes::ingest_artifacts::<S>))
    .route("/artifacts/query", post(nodes::query_artifacts::<S>))
    // Relations
    .route(
      "/occurrences",
      get(relations::list_occurrences::<S>).post(relations::ingest_occurrence::<S>),
    )
    .route("/occurrences/batch", post(relations::ingest_occurrences::<S>))
    .route("/occurrences/query", post(relations::query_occurrences::<S>))
    .route(
      "/dependencies",
      get(relations::list_dependencies::<S>).post(relations::ingest_dependency::<S>),
    )
    .route("/dependencies/batch", post(relations::ingest_dependencies::<S>))
    .route("/dependencies/query", post(relations::query_dependencies::<S>))
    .route("/sboms", get(relations::list_sboms::<S>).post(relations::ingest_sbom::<S>))
    .route("/sboms/batch", post(relations::ingest_sboms::<S>))
    .route("/sboms/query", post(relations::query_sboms::<S>))
    .with_state(store)
}
