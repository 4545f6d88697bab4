//! [`SqliteStore`]: the SQLite implementation of [`GraphStore`].

use std::path::Path;

use provgraph_core::{
  Id, IdOr,
  artifact::{Artifact, ArtifactFilter, ArtifactInput},
  dependency::{Dependency, DependencyFilter, DependencyInput},
  dispatch::{DEFAULT_CONCURRENCY, dispatch},
  occurrence::{Occurrence, OccurrenceFilter, OccurrenceInput},
  package::{PackageFilter, PackageIds, PackageInput, PackageNode},
  sbom::{HasSbom, SbomFilter, SbomIncludes, SbomInput},
  source::{SourceFilter, SourceIds, SourceInput, SourceNode},
  store::{DependentCount, GraphStore, MAX_PAGE_SIZE},
  subject::{DependentMatch, PackageOrArtifactInput, PackageOrSourceInput},
};
use rusqlite::{Connection, TransactionBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Result, dependency,
  error::OpContext as _,
  hydrate, identity, occurrence,
  predicate::{Predicate, Select},
  query, sbom,
  schema::{SCHEMA, unique_indexes},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A provgraph store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every call
/// runs on the connection's dedicated thread inside its own transaction and
/// races the store's cancellation token.
#[derive(Clone)]
pub struct SqliteStore {
  conn:        tokio_rusqlite::Connection,
  cancel:      CancellationToken,
  concurrency: usize,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self {
      conn,
      cancel: CancellationToken::new(),
      concurrency: DEFAULT_CONCURRENCY,
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Fail every in-flight and future call once `token` is cancelled.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = token;
    self
  }

  /// Maximum number of batch items in flight at once.
  pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
    self.concurrency = limit.max(1);
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        for ddl in unique_indexes() {
          conn.execute(&ddl, [])?;
        }
        Ok(())
      })
      .await
      .op("init_schema")
  }

  async fn call<T, F>(&self, work: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    let call = self.conn.call(move |conn| Ok(work(conn)));
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(provgraph_core::Error::Cancelled.into()),
      result = call => result?,
    }
  }

  /// Run `work` in one transaction; any error rolls the whole unit back.
  async fn transaction<T, F>(
    &self,
    op: &'static str,
    behavior: TransactionBehavior,
    work: F,
  ) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(behavior)?;
        let out = work(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await
      .op(op)
  }

  async fn write<T, F>(&self, op: &'static str, work: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.transaction(op, TransactionBehavior::Immediate, work).await
  }

  async fn read<T, F>(&self, op: &'static str, work: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.transaction(op, TransactionBehavior::Deferred, work).await
  }

  /// Fan `items` out with bounded concurrency, one transaction per item.
  async fn batch<R, T, F>(&self, op: &'static str, items: Vec<R>, work: F) -> Result<Vec<T>>
  where
    R: Send + 'static,
    T: Send + 'static,
    F: Fn(&Connection, R) -> Result<T> + Copy + Send + Sync + 'static,
  {
    let count = items.len();
    let ids = dispatch(&self.cancel, self.concurrency, items, move |item| async move {
      self.write(op, move |tx| work(tx, item)).await
    })
    .await
    .op(op)?;
    tracing::debug!(op, count, "batch committed");
    Ok(ids)
  }

  /// Select ids of `table` matching `predicate` and hydrate them.
  async fn query<T, F>(
    &self,
    op: &'static str,
    table: &'static str,
    predicate: Predicate,
    hydrate: F,
  ) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: FnOnce(&Connection, &[Id]) -> Result<Vec<T>> + Send + 'static,
  {
    let select = Select::ids(table, &predicate, MAX_PAGE_SIZE);
    self
      .read(op, move |conn| {
        let ids = select.fetch(conn)?;
        hydrate(conn, &ids)
      })
      .await
  }

  /// Re-read one freshly written row through its hydrating loader.
  async fn reread<T, F>(&self, op: &'static str, table: &'static str, id: Id, hydrate: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection, &[Id]) -> Result<Vec<T>> + Send + 'static,
  {
    self
      .read(op, move |conn| hydrate(conn, &[id]))
      .await?
      .pop()
      .ok_or_else(|| Error::corrupt(table, format!("row {id} missing after commit")))
      .op(op)
  }

  #[cfg(test)]
  pub(crate) async fn row_count(&self, table: &'static str) -> Result<u64> {
    self
      .read("row_count", move |conn| {
        let count: i64 =
          conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as u64)
      })
      .await
  }
}

/// Reject parallel batch inputs whose lengths differ.
fn same_lengths(lengths: &[usize]) -> provgraph_core::Result<()> {
  match lengths.split_first() {
    Some((first, rest)) if rest.iter().any(|len| len != first) => Err(
      provgraph_core::Error::invalid(format!("batch inputs have mismatched lengths {lengths:?}")),
    ),
    _ => Ok(()),
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  // ── Identity tree ─────────────────────────────────────────────────────────

  async fn ingest_package(&self, package: PackageInput) -> Result<PackageIds> {
    package.validate_version().op("ingest_package")?;
    self
      .write("ingest_package", move |tx| identity::ensure_package(tx, &package))
      .await
  }

  async fn ingest_packages(&self, packages: Vec<PackageInput>) -> Result<Vec<PackageIds>> {
    for package in &packages {
      package.validate_version().op("ingest_packages")?;
    }
    self
      .batch("ingest_packages", packages, |tx, p: PackageInput| {
        identity::ensure_package(tx, &p)
      })
      .await
  }

  async fn ingest_source(&self, source: SourceInput) -> Result<SourceIds> {
    source.validate().op("ingest_source")?;
    self
      .write("ingest_source", move |tx| identity::ensure_source(tx, &source))
      .await
  }

  async fn ingest_sources(&self, sources: Vec<SourceInput>) -> Result<Vec<SourceIds>> {
    for source in &sources {
      source.validate().op("ingest_sources")?;
    }
    self
      .batch("ingest_sources", sources, |tx, s: SourceInput| identity::ensure_source(tx, &s))
      .await
  }

  async fn ingest_artifact(&self, artifact: ArtifactInput) -> Result<Id> {
    let artifact = artifact.normalized().op("ingest_artifact")?;
    self
      .write("ingest_artifact", move |tx| identity::ensure_artifact(tx, &artifact))
      .await
  }

  async fn ingest_artifacts(&self, artifacts: Vec<ArtifactInput>) -> Result<Vec<Id>> {
    let artifacts = artifacts
      .iter()
      .map(ArtifactInput::normalized)
      .collect::<provgraph_core::Result<Vec<_>>>()
      .op("ingest_artifacts")?;
    self
      .batch("ingest_artifacts", artifacts, |tx, a: ArtifactInput| {
        identity::ensure_artifact(tx, &a)
      })
      .await
  }

  async fn packages<'a>(&'a self, filter: Option<&'a PackageFilter>) -> Result<Vec<PackageNode>> {
    let predicate = filter.map(query::package_version).unwrap_or_default();
    self
      .query("packages", "package_versions", predicate, hydrate::package_version_list)
      .await
  }

  async fn sources<'a>(&'a self, filter: Option<&'a SourceFilter>) -> Result<Vec<SourceNode>> {
    let predicate = filter.map(query::source).unwrap_or_default();
    self
      .query("sources", "source_names", predicate, hydrate::source_list)
      .await
  }

  async fn artifacts<'a>(&'a self, filter: Option<&'a ArtifactFilter>) -> Result<Vec<Artifact>> {
    let predicate = filter.map(query::artifact).unwrap_or_default();
    self
      .query("artifacts", "artifacts", predicate, hydrate::artifact_list)
      .await
  }

  // ── Occurrence ────────────────────────────────────────────────────────────

  async fn ingest_occurrence(
    &self,
    subject: PackageOrSourceInput,
    artifact: IdOr<ArtifactInput>,
    occurrence: OccurrenceInput,
  ) -> Result<Occurrence> {
    const OP: &str = "ingest_occurrence";
    let request = occurrence::Request::new(subject, artifact, occurrence).op(OP)?;
    let id = self.write(OP, move |tx| request.ingest(tx)).await?;
    self.reread(OP, "occurrences", id, hydrate::occurrences).await
  }

  async fn ingest_occurrences(
    &self,
    subjects: Vec<PackageOrSourceInput>,
    artifacts: Vec<IdOr<ArtifactInput>>,
    occurrences: Vec<OccurrenceInput>,
  ) -> Result<Vec<Id>> {
    const OP: &str = "ingest_occurrences";
    same_lengths(&[subjects.len(), artifacts.len(), occurrences.len()]).op(OP)?;
    let requests = subjects
      .into_iter()
      .zip(artifacts)
      .zip(occurrences)
      .map(|((s, a), o)| occurrence::Request::new(s, a, o))
      .collect::<provgraph_core::Result<Vec<_>>>()
      .op(OP)?;
    self
      .batch(OP, requests, |tx, r: occurrence::Request| r.ingest(tx))
      .await
  }

  async fn occurrences<'a>(
    &'a self,
    filter: Option<&'a OccurrenceFilter>,
  ) -> Result<Vec<Occurrence>> {
    let predicate = filter.map(query::occurrence).unwrap_or_default();
    self
      .query("occurrences", "occurrences", predicate, hydrate::occurrences)
      .await
  }

  // ── Dependency ────────────────────────────────────────────────────────────

  async fn ingest_dependency(
    &self,
    package: IdOr<PackageInput>,
    dependent: IdOr<PackageInput>,
    matching: DependentMatch,
    dependency: DependencyInput,
  ) -> Result<Dependency> {
    const OP: &str = "ingest_dependency";
    let request = dependency::Request::new(package, dependent, matching, dependency).op(OP)?;
    let id = self.write(OP, move |tx| request.ingest(tx)).await?;
    self.reread(OP, "dependencies", id, hydrate::dependencies).await
  }

  async fn ingest_dependencies(
    &self,
    packages: Vec<IdOr<PackageInput>>,
    dependents: Vec<IdOr<PackageInput>>,
    matching: DependentMatch,
    dependencies: Vec<DependencyInput>,
  ) -> Result<Vec<Id>> {
    const OP: &str = "ingest_dependencies";
    same_lengths(&[packages.len(), dependents.len(), dependencies.len()]).op(OP)?;
    let requests = packages
      .into_iter()
      .zip(dependents)
      .zip(dependencies)
      .map(|((p, d), dep)| dependency::Request::new(p, d, matching, dep))
      .collect::<provgraph_core::Result<Vec<_>>>()
      .op(OP)?;
    self
      .batch(OP, requests, |tx, r: dependency::Request| r.ingest(tx))
      .await
  }

  async fn dependencies<'a>(
    &'a self,
    filter: Option<&'a DependencyFilter>,
  ) -> Result<Vec<Dependency>> {
    let predicate = filter.map(query::dependency).unwrap_or_default();
    self
      .query("dependencies", "dependencies", predicate, hydrate::dependencies)
      .await
  }

  async fn dependent_frequency(&self, limit: usize) -> Result<Vec<DependentCount>> {
    let limit = limit.min(MAX_PAGE_SIZE);
    self
      .read("dependent_frequency", move |conn| {
        // Ties are broken on the rendered purl, so every group is ranked
        // before truncating.
        let mut stmt = conn.prepare(
          "SELECT COALESCE(d.dependent_name_id, v.name_id) AS name_id, COUNT(*) AS uses
           FROM dependencies d
           LEFT JOIN package_versions v ON v.id = d.dependent_version_id
           GROUP BY name_id",
        )?;
        let counts = stmt
          .query_map([], |row| Ok((Id(row.get(0)?), row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let ids: Vec<Id> = counts.iter().map(|(id, _)| *id).collect();
        let mut names = hydrate::package_names(conn, &ids)?;
        let mut ranked = counts
          .into_iter()
          .map(|(id, uses)| -> Result<(String, DependentCount)> {
            let package = names
              .remove(&id)
              .ok_or_else(|| Error::corrupt("dependencies", format!("dangling dependent {id}")))?;
            Ok((package.purl(), DependentCount { package, count: uses as u64 }))
          })
          .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked.into_iter().map(|(_, d)| d).collect())
      })
      .await
  }

  // ── SBOM ──────────────────────────────────────────────────────────────────

  async fn ingest_sbom(
    &self,
    subject: PackageOrArtifactInput,
    sbom: SbomInput,
    includes: SbomIncludes,
  ) -> Result<HasSbom> {
    const OP: &str = "ingest_sbom";
    let request = sbom::Request::new(subject, sbom, includes).op(OP)?;
    let id = self.write(OP, move |tx| request.ingest(tx)).await?;
    self.reread(OP, "sboms", id, hydrate::sboms).await
  }

  async fn ingest_sboms(
    &self,
    subjects: Vec<PackageOrArtifactInput>,
    sboms: Vec<SbomInput>,
    includes: Vec<SbomIncludes>,
  ) -> Result<Vec<Id>> {
    const OP: &str = "ingest_sboms";
    same_lengths(&[subjects.len(), sboms.len(), includes.len()]).op(OP)?;
    let requests = subjects
      .into_iter()
      .zip(sboms)
      .zip(includes)
      .map(|((s, b), i)| sbom::Request::new(s, b, i))
      .collect::<provgraph_core::Result<Vec<_>>>()
      .op(OP)?;
    self
      .batch(OP, requests, |tx, r: sbom::Request| r.ingest(tx))
      .await
  }

  async fn sboms<'a>(&'a self, filter: Option<&'a SbomFilter>) -> Result<Vec<HasSbom>> {
    let predicate = filter.map(query::sbom).unwrap_or_default();
    self.query("sboms", "sboms", predicate, hydrate::sboms).await
  }
}
