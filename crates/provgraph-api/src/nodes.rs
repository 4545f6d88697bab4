//! Handlers for the identity-tree and artifact endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/packages` | Body: [`PackageInput`]; returns [`PackageIds`] |
//! | `POST` | `/packages/batch` | Body: array of [`PackageInput`] |
//! | `GET`  | `/packages` | Every package version |
//! | `POST` | `/packages/query` | Body: [`PackageFilter`] |
//!
//! `/sources` and `/artifacts` follow the same shape.

use std::sync::Arc;

use axum::{Json, extract::State};
use provgraph_core::{
  Id,
  artifact::{Artifact, ArtifactFilter, ArtifactInput},
  package::{PackageFilter, PackageIds, PackageInput, PackageNode},
  source::{SourceFilter, SourceIds, SourceInput, SourceNode},
  store::GraphStore,
};

use crate::{Body, error::ApiError};

// ─── Packages ─────────────────────────────────────────────────────────────────

/// `POST /packages`
pub async fn ingest_package<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<PackageInput>,
) -> Result<Json<PackageIds>, ApiError> {
  let Json(package) = body?;
  let ids = store.ingest_package(package).await.map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `POST /packages/batch`
pub async fn ingest_packages<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<Vec<PackageInput>>,
) -> Result<Json<Vec<PackageIds>>, ApiError> {
  let Json(packages) = body?;
  let ids = store.ingest_packages(packages).await.map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /packages`
pub async fn list_packages<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<PackageNode>>, ApiError> {
  let nodes = store.packages(None).await.map_err(ApiError::store)?;
  Ok(Json(nodes))
}

/// `POST /packages/query`
pub async fn query_packages<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<PackageFilter>,
) -> Result<Json<Vec<PackageNode>>, ApiError> {
  let Json(filter) = body?;
  let nodes = store.packages(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(nodes))
}

// ─── Sources ──────────────────────────────────────────────────────────────────

/// `POST /sources`
pub async fn ingest_source<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<SourceInput>,
) -> Result<Json<SourceIds>, ApiError> {
  let Json(source) = body?;
  let ids = store.ingest_source(source).await.map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `POST /sources/batch`
pub async fn ingest_sources<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<Vec<SourceInput>>,
) -> Result<Json<Vec<SourceIds>>, ApiError> {
  let Json(sources) = body?;
  let ids = store.ingest_sources(sources).await.map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /sources`
pub async fn list_sources<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<SourceNode>>, ApiError> {
  let nodes = store.sources(None).await.map_err(ApiError::store)?;
  Ok(Json(nodes))
}

/// `POST /sources/query`
pub async fn query_sources<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<SourceFilter>,
) -> Result<Json<Vec<SourceNode>>, ApiError> {
  let Json(filter) = body?;
  let nodes = store.sources(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(nodes))
}

// ─── Artifacts ────────────────────────────────────────────────────────────────

/// `POST /artifacts`
pub async fn ingest_artifact<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<ArtifactInput>,
) -> Result<Json<Id>, ApiError> {
  let Json(artifact) = body?;
  let id = store.ingest_artifact(artifact).await.map_err(ApiError::store)?;
  Ok(Json(id))
}

/// `POST /artifacts/batch`
pub async fn ingest_artifacts<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<Vec<ArtifactInput>>,
) -> Result<Json<Vec<Id>>, ApiError> {
  let Json(artifacts) = body?;
  let ids = store.ingest_artifacts(artifacts).await.map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /artifacts`
pub async fn list_artifacts<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
  let artifacts = store.artifacts(None).await.map_err(ApiError::store)?;
  Ok(Json(artifacts))
}

/// `POST /artifacts/query`
pub async fn query_artifacts<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<ArtifactFilter>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
  let Json(filter) = body?;
  let artifacts = store.artifacts(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(artifacts))
}
