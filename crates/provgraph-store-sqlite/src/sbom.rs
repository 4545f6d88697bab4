//! SBOM ingestion: a bill of materials attached to a package or artifact,
//! linking sets of existing packages, artifacts, dependencies and
//! occurrences.

use provgraph_core::{
  Id,
  sbom::{SbomIncludes, SbomInput},
  subject::{PackageOrArtifact, PackageOrArtifactInput, SbomSubject},
};
use rusqlite::Connection;

use crate::{
  Result,
  encode::encode_dt,
  identity, keys,
  upsert::{ConflictPolicy, Upsert, Upserted},
};

/// One include set: its join table, member column, target table and the
/// entity name used in not-found errors.
struct IncludeSet {
  join:   &'static str,
  member: &'static str,
  table:  &'static str,
  entity: &'static str,
}

const PACKAGES: IncludeSet = IncludeSet {
  join:   "sbom_included_packages",
  member: "package_id",
  table:  "package_versions",
  entity: "included package",
};
const ARTIFACTS: IncludeSet = IncludeSet {
  join:   "sbom_included_artifacts",
  member: "artifact_id",
  table:  "artifacts",
  entity: "included artifact",
};
const DEPENDENCIES: IncludeSet = IncludeSet {
  join:   "sbom_included_dependencies",
  member: "dependency_id",
  table:  "dependencies",
  entity: "included dependency",
};
const OCCURRENCES: IncludeSet = IncludeSet {
  join:   "sbom_included_occurrences",
  member: "occurrence_id",
  table:  "occurrences",
  entity: "included occurrence",
};

#[derive(Debug, Clone)]
pub struct Request {
  subject:  SbomSubject,
  sbom:     SbomInput,
  includes: SbomIncludes,
}

impl Request {
  pub fn new(
    subject: PackageOrArtifactInput,
    sbom: SbomInput,
    includes: SbomIncludes,
  ) -> provgraph_core::Result<Self> {
    let subject = subject.discriminate()?;
    match &subject {
      PackageOrArtifact::Package(p) => identity::check_package_version(p)?,
      PackageOrArtifact::Artifact(a) => identity::check_artifact(a)?,
    }
    if sbom.uri.is_empty() {
      return Err(provgraph_core::Error::invalid("sbom uri must not be empty"));
    }
    Ok(Self { subject, sbom, includes: includes.normalized() })
  }

  fn sets(&self) -> [(&IncludeSet, &[Id]); 4] {
    [
      (&PACKAGES, self.includes.packages.as_slice()),
      (&ARTIFACTS, self.includes.artifacts.as_slice()),
      (&DEPENDENCIES, self.includes.dependencies.as_slice()),
      (&OCCURRENCES, self.includes.occurrences.as_slice()),
    ]
  }

  /// Every included id must exist, even when the SBOM itself already does.
  fn check_includes(&self, conn: &Connection) -> Result<()> {
    for (set, ids) in self.sets() {
      for id in ids {
        identity::require(conn, set.table, set.entity, *id)?;
      }
    }
    Ok(())
  }

  fn link_includes(&self, conn: &Connection, sbom_id: Id) -> Result<()> {
    for (set, ids) in self.sets() {
      let mut stmt = conn.prepare_cached(&format!(
        "INSERT OR IGNORE INTO {} (sbom_id, {}) VALUES (?1, ?2)",
        set.join, set.member
      ))?;
      for id in ids {
        stmt.execute([sbom_id.0, id.0])?;
      }
    }
    Ok(())
  }

  /// The SBOM row is immutable: a repeat ingest resolves to the existing
  /// row and its include sets are left as first written.
  pub fn ingest(&self, conn: &Connection) -> Result<Id> {
    let subject_id = match &self.subject {
      PackageOrArtifact::Package(p) => identity::package_version(conn, p)?,
      PackageOrArtifact::Artifact(a) => identity::artifact(conn, a)?,
    };
    self.check_includes(conn)?;

    let s = &self.sbom;
    let upserted = Upsert::new(keys::SBOM.scoped_by(&self.subject), ConflictPolicy::Ignore)
      .arm(subject_id)
      .text("uri", s.uri.as_str())
      .text("algorithm", s.algorithm.to_lowercase())
      .text("digest", s.digest.to_lowercase())
      .text("download_location", s.download_location.as_str())
      .text("origin", s.origin.as_str())
      .text("collector", s.collector.as_str())
      .text("known_since", encode_dt(s.known_since))
      .execute(conn)?;

    if let Upserted::Inserted(id) = upserted {
      self.link_includes(conn, id)?;
    }
    Ok(upserted.id())
  }
}
