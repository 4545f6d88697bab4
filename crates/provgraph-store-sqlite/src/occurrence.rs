//! Occurrence ingestion: an artifact observed as a package or a source.

use provgraph_core::{
  Id, IdOr,
  artifact::ArtifactInput,
  occurrence::OccurrenceInput,
  subject::{OccurrenceSubject, PackageOrSource, PackageOrSourceInput},
};
use rusqlite::Connection;

use crate::{
  Result, identity, keys,
  upsert::{ConflictPolicy, Upsert},
};

/// A validated occurrence request, ready to run inside a transaction.
#[derive(Debug, Clone)]
pub struct Request {
  subject:    OccurrenceSubject,
  artifact:   IdOr<ArtifactInput>,
  occurrence: OccurrenceInput,
}

impl Request {
  /// Discriminate and validate without touching the store.
  pub fn new(
    subject: PackageOrSourceInput,
    artifact: IdOr<ArtifactInput>,
    occurrence: OccurrenceInput,
  ) -> provgraph_core::Result<Self> {
    let subject = subject.discriminate()?;
    match &subject {
      PackageOrSource::Package(p) => identity::check_package_version(p)?,
      PackageOrSource::Source(s) => identity::check_source(s)?,
    }
    identity::check_artifact(&artifact)?;
    Ok(Self { subject, artifact, occurrence })
  }

  /// Resolve references and upsert the occurrence row. Metadata always
  /// reflects the latest ingest.
  pub fn ingest(&self, conn: &Connection) -> Result<Id> {
    let artifact_id = identity::artifact(conn, &self.artifact)?;
    let subject_id = match &self.subject {
      PackageOrSource::Package(p) => identity::package_version(conn, p)?,
      PackageOrSource::Source(s) => identity::source(conn, s)?,
    };

    let upserted = Upsert::new(keys::OCCURRENCE.scoped_by(&self.subject), ConflictPolicy::Merge)
      .arm(subject_id)
      .set("artifact_id", artifact_id.0)
      .text("justification", self.occurrence.justification.as_str())
      .text("origin", self.occurrence.origin.as_str())
      .text("collector", self.occurrence.collector.as_str())
      .execute(conn)?;
    Ok(upserted.id())
  }
}
