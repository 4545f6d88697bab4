//! HasSBOM: a software bill of materials attached to a package or artifact,
//! bundling sets of already-ingested packages, artifacts, dependencies and
//! occurrences.
//!
//! An SBOM row is immutable once created: re-ingesting the same SBOM with a
//! different include set resolves to the existing row and does not merge
//! the sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Id,
  artifact::{Artifact, ArtifactFilter},
  dependency::{Dependency, DependencyFilter},
  id::sort_and_dedup,
  occurrence::{Occurrence, OccurrenceFilter},
  package::{PackageFilter, PackageNode},
  subject::PackageOrArtifact,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomInput {
  pub uri:               String,
  #[serde(default)]
  pub algorithm:         String,
  #[serde(default)]
  pub digest:            String,
  #[serde(default)]
  pub download_location: String,
  #[serde(default)]
  pub origin:            String,
  #[serde(default)]
  pub collector:         String,
  pub known_since:       DateTime<Utc>,
}

/// Identifiers of existing entities bundled by an SBOM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomIncludes {
  /// Package version ids.
  pub packages:     Vec<Id>,
  pub artifacts:    Vec<Id>,
  pub dependencies: Vec<Id>,
  pub occurrences:  Vec<Id>,
}

impl SbomIncludes {
  /// Each set sorted and de-duplicated.
  pub fn normalized(&self) -> Self {
    Self {
      packages:     sort_and_dedup(&self.packages),
      artifacts:    sort_and_dedup(&self.artifacts),
      dependencies: sort_and_dedup(&self.dependencies),
      occurrences:  sort_and_dedup(&self.occurrences),
    }
  }
}

/// A stored SBOM with its subject and every included set hydrated; included
/// dependencies and occurrences carry their own subjects and objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasSbom {
  pub id:                    Id,
  pub subject:               PackageOrArtifact<PackageNode, Artifact>,
  pub uri:                   String,
  pub algorithm:             String,
  pub digest:                String,
  pub download_location:     String,
  pub origin:                String,
  pub collector:             String,
  pub known_since:           DateTime<Utc>,
  pub included_packages:     Vec<PackageNode>,
  pub included_artifacts:    Vec<Artifact>,
  pub included_dependencies: Vec<Dependency>,
  pub included_occurrences:  Vec<Occurrence>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomFilter {
  pub id:                    Option<Id>,
  pub subject:               Option<PackageOrArtifact<PackageFilter, ArtifactFilter>>,
  pub uri:                   Option<String>,
  pub algorithm:             Option<String>,
  pub digest:                Option<String>,
  pub download_location:     Option<String>,
  pub origin:                Option<String>,
  pub collector:             Option<String>,
  pub known_since:           Option<DateTime<Utc>>,
  /// Every entry must match at least one included package or artifact.
  pub included_software:     Vec<PackageOrArtifact<PackageFilter, ArtifactFilter>>,
  pub included_dependencies: Vec<DependencyFilter>,
  pub included_occurrences:  Vec<OccurrenceFilter>,
}
