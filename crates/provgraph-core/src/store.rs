//! The `GraphStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `provgraph-store-sqlite`). The HTTP API and the document pipeline depend
//! on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Classify, Id, IdOr,
  artifact::{Artifact, ArtifactFilter, ArtifactInput},
  dependency::{Dependency, DependencyFilter, DependencyInput},
  occurrence::{Occurrence, OccurrenceFilter, OccurrenceInput},
  package::{PackageFilter, PackageIds, PackageInput, PackageNode},
  sbom::{HasSbom, SbomFilter, SbomIncludes, SbomInput},
  source::{SourceFilter, SourceIds, SourceInput, SourceNode},
  subject::{DependentMatch, PackageOrArtifactInput, PackageOrSourceInput},
};

/// Upper bound on the number of rows any query returns.
pub const MAX_PAGE_SIZE: usize = 1000;

/// A package together with how many dependency facts point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentCount {
  pub package: PackageNode,
  pub count:   u64,
}

/// Abstraction over a supply-chain graph backend.
///
/// Every ingestion is idempotent: re-ingesting an identical fact resolves to
/// the existing node. Batch variants take parallel vectors matched by
/// position, reject mismatched lengths before doing any work, and return ids
/// in input order. A failed batch may have committed a prefix of its items.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Identity tree ─────────────────────────────────────────────────────

  /// Find or create every level of a version-level package path.
  fn ingest_package(
    &self,
    package: PackageInput,
  ) -> impl Future<Output = Result<PackageIds, Self::Error>> + Send + '_;

  fn ingest_packages(
    &self,
    packages: Vec<PackageInput>,
  ) -> impl Future<Output = Result<Vec<PackageIds>, Self::Error>> + Send + '_;

  fn ingest_source(
    &self,
    source: SourceInput,
  ) -> impl Future<Output = Result<SourceIds, Self::Error>> + Send + '_;

  fn ingest_sources(
    &self,
    sources: Vec<SourceInput>,
  ) -> impl Future<Output = Result<Vec<SourceIds>, Self::Error>> + Send + '_;

  fn ingest_artifact(
    &self,
    artifact: ArtifactInput,
  ) -> impl Future<Output = Result<Id, Self::Error>> + Send + '_;

  fn ingest_artifacts(
    &self,
    artifacts: Vec<ArtifactInput>,
  ) -> impl Future<Output = Result<Vec<Id>, Self::Error>> + Send + '_;

  /// Version-level package nodes matching `filter` (`None` matches all).
  fn packages<'a>(
    &'a self,
    filter: Option<&'a PackageFilter>,
  ) -> impl Future<Output = Result<Vec<PackageNode>, Self::Error>> + Send + 'a;

  fn sources<'a>(
    &'a self,
    filter: Option<&'a SourceFilter>,
  ) -> impl Future<Output = Result<Vec<SourceNode>, Self::Error>> + Send + 'a;

  fn artifacts<'a>(
    &'a self,
    filter: Option<&'a ArtifactFilter>,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + 'a;

  // ── Occurrence ────────────────────────────────────────────────────────

  /// Record that `artifact` occurs as the subject package or source. The
  /// returned record is re-read after commit.
  fn ingest_occurrence(
    &self,
    subject: PackageOrSourceInput,
    artifact: IdOr<ArtifactInput>,
    occurrence: OccurrenceInput,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  fn ingest_occurrences(
    &self,
    subjects: Vec<PackageOrSourceInput>,
    artifacts: Vec<IdOr<ArtifactInput>>,
    occurrences: Vec<OccurrenceInput>,
  ) -> impl Future<Output = Result<Vec<Id>, Self::Error>> + Send + '_;

  fn occurrences<'a>(
    &'a self,
    filter: Option<&'a OccurrenceFilter>,
  ) -> impl Future<Output = Result<Vec<Occurrence>, Self::Error>> + Send + 'a;

  // ── Dependency ────────────────────────────────────────────────────────

  fn ingest_dependency(
    &self,
    package: IdOr<PackageInput>,
    dependent: IdOr<PackageInput>,
    matching: DependentMatch,
    dependency: DependencyInput,
  ) -> impl Future<Output = Result<Dependency, Self::Error>> + Send + '_;

  fn ingest_dependencies(
    &self,
    packages: Vec<IdOr<PackageInput>>,
    dependents: Vec<IdOr<PackageInput>>,
    matching: DependentMatch,
    dependencies: Vec<DependencyInput>,
  ) -> impl Future<Output = Result<Vec<Id>, Self::Error>> + Send + '_;

  fn dependencies<'a>(
    &'a self,
    filter: Option<&'a DependencyFilter>,
  ) -> impl Future<Output = Result<Vec<Dependency>, Self::Error>> + Send + 'a;

  /// Dependent packages ranked by the number of dependency facts pointing
  /// at them, most depended-upon first. Equal counts are ordered by purl
  /// before `limit` applies.
  fn dependent_frequency(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DependentCount>, Self::Error>> + Send + '_;

  // ── SBOM ──────────────────────────────────────────────────────────────

  /// Attach an SBOM to a package or artifact. Every included id must
  /// already exist; nothing is created implicitly.
  fn ingest_sbom(
    &self,
    subject: PackageOrArtifactInput,
    sbom: SbomInput,
    includes: SbomIncludes,
  ) -> impl Future<Output = Result<HasSbom, Self::Error>> + Send + '_;

  fn ingest_sboms(
    &self,
    subjects: Vec<PackageOrArtifactInput>,
    sboms: Vec<SbomInput>,
    includes: Vec<SbomIncludes>,
  ) -> impl Future<Output = Result<Vec<Id>, Self::Error>> + Send + '_;

  fn sboms<'a>(
    &'a self,
    filter: Option<&'a SbomFilter>,
  ) -> impl Future<Output = Result<Vec<HasSbom>, Self::Error>> + Send + 'a;
}
