//! Collector documents.
//!
//! A [`Document`] is the unit a collector hands to the ingestion pipeline:
//! one [`IngestRequest`] plus provenance about who produced it. Documents
//! travel as JSON bytes so the transport never needs to know the request
//! types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Id, IdOr, Result,
  artifact::ArtifactInput,
  dependency::DependencyInput,
  occurrence::OccurrenceInput,
  package::PackageInput,
  sbom::{SbomIncludes, SbomInput},
  source::SourceInput,
  store::GraphStore,
  subject::{DependentMatch, PackageOrArtifactInput, PackageOrSourceInput},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id:        Uuid,
  pub collector: String,
  /// Where the collector found the document (a URL, a path).
  pub source:    String,
  pub request:   IngestRequest,
}

impl Document {
  pub fn new(
    collector: impl Into<String>,
    source: impl Into<String>,
    request: IngestRequest,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      collector: collector.into(),
      source: source.into(),
      request,
    }
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }

  pub fn from_slice(bytes: &[u8]) -> Result<Self> { Ok(serde_json::from_slice(bytes)?) }
}

/// A single ingestion, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestRequest {
  Package(PackageInput),
  Source(SourceInput),
  Artifact(ArtifactInput),
  Occurrence {
    subject:    PackageOrSourceInput,
    artifact:   IdOr<ArtifactInput>,
    #[serde(default)]
    occurrence: OccurrenceInput,
  },
  Dependency {
    package:    IdOr<PackageInput>,
    dependent:  IdOr<PackageInput>,
    #[serde(default)]
    matching:   DependentMatch,
    #[serde(default)]
    dependency: DependencyInput,
  },
  Sbom {
    subject:  PackageOrArtifactInput,
    sbom:     SbomInput,
    #[serde(default)]
    includes: SbomIncludes,
  },
}

impl IngestRequest {
  pub fn kind(&self) -> &'static str {
    match self {
      IngestRequest::Package(_) => "package",
      IngestRequest::Source(_) => "source",
      IngestRequest::Artifact(_) => "artifact",
      IngestRequest::Occurrence { .. } => "occurrence",
      IngestRequest::Dependency { .. } => "dependency",
      IngestRequest::Sbom { .. } => "sbom",
    }
  }

  /// Apply the request to `store`, returning the id of the deepest node or
  /// relation it resolved to.
  pub async fn apply<S: GraphStore>(self, store: &S) -> Result<Id, S::Error> {
    match self {
      IngestRequest::Package(p) => Ok(store.ingest_package(p).await?.version_id),
      IngestRequest::Source(s) => Ok(store.ingest_source(s).await?.name_id),
      IngestRequest::Artifact(a) => store.ingest_artifact(a).await,
      IngestRequest::Occurrence { subject, artifact, occurrence } => Ok(
        store
          .ingest_occurrence(subject, artifact, occurrence)
          .await?
          .id,
      ),
      IngestRequest::Dependency { package, dependent, matching, dependency } => Ok(
        store
          .ingest_dependency(package, dependent, matching, dependency)
          .await?
          .id,
      ),
      IngestRequest::Sbom { subject, sbom, includes } => {
        Ok(store.ingest_sbom(subject, sbom, includes).await?.id)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn document_survives_the_wire() {
    let doc = Document::new(
      "deps.dev",
      "https://deps.dev/npm/left-pad",
      IngestRequest::Package(PackageInput::new("npm", "", "left-pad").with_version("1.3.0")),
    );
    let back = Document::from_slice(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(back, doc);
  }

  #[test]
  fn requests_are_tagged_by_kind() {
    let json = r#"{
      "kind": "occurrence",
      "subject": { "source": { "descriptor": { "type": "git", "namespace": "github.com", "name": "guac" } } },
      "artifact": { "id": 7 }
    }"#;
    let request: IngestRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.kind(), "occurrence");
    let IngestRequest::Occurrence { artifact, occurrence, .. } = request else {
      panic!("expected an occurrence request");
    };
    assert_eq!(artifact, IdOr::Id(Id(7)));
    assert_eq!(occurrence, OccurrenceInput::default());
  }
}
