//! Occurrence: an artifact observed as a package or a source.

use serde::{Deserialize, Serialize};

use crate::{
  Id,
  artifact::{Artifact, ArtifactFilter},
  package::{PackageFilter, PackageNode},
  source::{SourceFilter, SourceNode},
  subject::PackageOrSource,
};

/// Metadata recorded with an occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccurrenceInput {
  pub justification: String,
  pub origin:        String,
  pub collector:     String,
}

impl OccurrenceInput {
  pub fn new(
    justification: impl Into<String>,
    origin: impl Into<String>,
    collector: impl Into<String>,
  ) -> Self {
    Self {
      justification: justification.into(),
      origin:        origin.into(),
      collector:     collector.into(),
    }
  }
}

/// A stored occurrence with subject and artifact fully hydrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
  pub id:            Id,
  pub subject:       PackageOrSource<PackageNode, SourceNode>,
  pub artifact:      Artifact,
  pub justification: String,
  pub origin:        String,
  pub collector:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccurrenceFilter {
  pub id:            Option<Id>,
  pub subject:       Option<PackageOrSource<PackageFilter, SourceFilter>>,
  pub artifact:      Option<ArtifactFilter>,
  pub justification: Option<String>,
  pub origin:        Option<String>,
  pub collector:     Option<String>,
}
