//! Handlers for the relation endpoints: `/occurrences`, `/dependencies` and
//! `/sboms`.
//!
//! Singular ingestion returns the hydrated relation. Batch ingestion takes
//! parallel arrays and returns ids in input order; arrays of different
//! lengths are rejected with 400.

use std::sync::Arc;

use axum::{Json, extract::State};
use provgraph_core::{
  Id, IdOr,
  artifact::ArtifactInput,
  dependency::{Dependency, DependencyFilter, DependencyInput},
  occurrence::{Occurrence, OccurrenceFilter, OccurrenceInput},
  package::PackageInput,
  sbom::{HasSbom, SbomFilter, SbomIncludes, SbomInput},
  store::GraphStore,
  subject::{DependentMatch, PackageOrArtifactInput, PackageOrSourceInput},
};
use serde::Deserialize;

use crate::{Body, error::ApiError};

// ─── Occurrences ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OccurrenceBody {
  pub subject:    PackageOrSourceInput,
  pub artifact:   IdOr<ArtifactInput>,
  #[serde(default)]
  pub occurrence: OccurrenceInput,
}

#[derive(Debug, Deserialize)]
pub struct OccurrenceBatchBody {
  pub subjects:    Vec<PackageOrSourceInput>,
  pub artifacts:   Vec<IdOr<ArtifactInput>>,
  pub occurrences: Vec<OccurrenceInput>,
}

/// `POST /occurrences`
pub async fn ingest_occurrence<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<OccurrenceBody>,
) -> Result<Json<Occurrence>, ApiError> {
  let Json(b) = body?;
  let occurrence = store
    .ingest_occurrence(b.subject, b.artifact, b.occurrence)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(occurrence))
}

/// `POST /occurrences/batch`
pub async fn ingest_occurrences<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<OccurrenceBatchBody>,
) -> Result<Json<Vec<Id>>, ApiError> {
  let Json(b) = body?;
  let ids = store
    .ingest_occurrences(b.subjects, b.artifacts, b.occurrences)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /occurrences`
pub async fn list_occurrences<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
  let found = store.occurrences(None).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

/// `POST /occurrences/query`
pub async fn query_occurrences<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<OccurrenceFilter>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
  let Json(filter) = body?;
  let found = store.occurrences(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

// ─── Dependencies ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DependencyBody {
  pub package:    IdOr<PackageInput>,
  pub dependent:  IdOr<PackageInput>,
  #[serde(default)]
  pub matching:   DependentMatch,
  #[serde(default)]
  pub dependency: DependencyInput,
}

#[derive(Debug, Deserialize)]
pub struct DependencyBatchBody {
  pub packages:     Vec<IdOr<PackageInput>>,
  pub dependents:   Vec<IdOr<PackageInput>>,
  /// Applies to every item in the batch.
  #[serde(default)]
  pub matching:     DependentMatch,
  pub dependencies: Vec<DependencyInput>,
}

/// `POST /dependencies`
pub async fn ingest_dependency<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<DependencyBody>,
) -> Result<Json<Dependency>, ApiError> {
  let Json(b) = body?;
  let dependency = store
    .ingest_dependency(b.package, b.dependent, b.matching, b.dependency)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(dependency))
}

/// `POST /dependencies/batch`
pub async fn ingest_dependencies<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<DependencyBatchBody>,
) -> Result<Json<Vec<Id>>, ApiError> {
  let Json(b) = body?;
  let ids = store
    .ingest_dependencies(b.packages, b.dependents, b.matching, b.dependencies)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /dependencies`
pub async fn list_dependencies<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Dependency>>, ApiError> {
  let found = store.dependencies(None).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

/// `POST /dependencies/query`
pub async fn query_dependencies<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<DependencyFilter>,
) -> Result<Json<Vec<Dependency>>, ApiError> {
  let Json(filter) = body?;
  let found = store.dependencies(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

// ─── SBOMs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SbomBody {
  pub subject:  PackageOrArtifactInput,
  pub sbom:     SbomInput,
  #[serde(default)]
  pub includes: SbomIncludes,
}

#[derive(Debug, Deserialize)]
pub struct SbomBatchBody {
  pub subjects: Vec<PackageOrArtifactInput>,
  pub sboms:    Vec<SbomInput>,
  pub includes: Vec<SbomIncludes>,
}

/// `POST /sboms`
pub async fn ingest_sbom<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<SbomBody>,
) -> Result<Json<HasSbom>, ApiError> {
  let Json(b) = body?;
  let sbom = store
    .ingest_sbom(b.subject, b.sbom, b.includes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(sbom))
}

/// `POST /sboms/batch`
pub async fn ingest_sboms<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<SbomBatchBody>,
) -> Result<Json<Vec<Id>>, ApiError> {
  let Json(b) = body?;
  let ids = store
    .ingest_sboms(b.subjects, b.sboms, b.includes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ids))
}

/// `GET /sboms`
pub async fn list_sboms<S: GraphStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<HasSbom>>, ApiError> {
  let found = store.sboms(None).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

/// `POST /sboms/query`
pub async fn query_sboms<S: GraphStore>(
  State(store): State<Arc<S>>,
  body: Body<SbomFilter>,
) -> Result<Json<Vec<HasSbom>>, ApiError> {
  let Json(filter) = body?;
  let found = store.sboms(Some(&filter)).await.map_err(ApiError::store)?;
  Ok(Json(found))
}
