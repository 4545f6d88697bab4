//! Polymorphic subjects.
//!
//! Relations are "about" exactly one of several entity kinds. The strict
//! enums here make "both" and "neither" unrepresentable; the `*Input`
//! structs are the loose wire shape (two optional arms) and are checked
//! once, by [`PackageOrSourceInput::discriminate`] and friends, before any
//! store access.

use serde::{Deserialize, Serialize};

use crate::{
  Error, IdOr, Result,
  artifact::ArtifactInput,
  package::PackageInput,
  source::SourceInput,
};

// ─── Strict variants ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOrSource<P, S> {
  Package(P),
  Source(S),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOrArtifact<P, A> {
  Package(P),
  Artifact(A),
}

/// How a dependency's dependent package is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentMatch {
  /// The dependent is a package name; any version matches.
  AllVersions,
  /// The dependent is one specific package version.
  #[default]
  SpecificVersion,
}

/// A resolved Occurrence subject reference.
pub type OccurrenceSubject = PackageOrSource<IdOr<PackageInput>, IdOr<SourceInput>>;

/// A resolved SBOM subject reference.
pub type SbomSubject = PackageOrArtifact<IdOr<PackageInput>, IdOr<ArtifactInput>>;

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOrSourceInput {
  pub package: Option<IdOr<PackageInput>>,
  pub source:  Option<IdOr<SourceInput>>,
}

impl PackageOrSourceInput {
  pub fn package(package: impl Into<IdOr<PackageInput>>) -> Self {
    Self { package: Some(package.into()), source: None }
  }

  pub fn source(source: impl Into<IdOr<SourceInput>>) -> Self {
    Self { package: None, source: Some(source.into()) }
  }

  pub fn discriminate(self) -> Result<OccurrenceSubject> {
    match (self.package, self.source) {
      (Some(p), None) => Ok(PackageOrSource::Package(p)),
      (None, Some(s)) => Ok(PackageOrSource::Source(s)),
      (None, None) => Err(Error::invalid(
        "subject must be either a package or a source, got neither",
      )),
      (Some(_), Some(_)) => Err(Error::invalid(
        "subject must be either a package or a source, got both",
      )),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOrArtifactInput {
  pub package:  Option<IdOr<PackageInput>>,
  pub artifact: Option<IdOr<ArtifactInput>>,
}

impl PackageOrArtifactInput {
  pub fn package(package: impl Into<IdOr<PackageInput>>) -> Self {
    Self { package: Some(package.into()), artifact: None }
  }

  pub fn artifact(artifact: impl Into<IdOr<ArtifactInput>>) -> Self {
    Self { package: None, artifact: Some(artifact.into()) }
  }

  pub fn discriminate(self) -> Result<SbomSubject> {
    match (self.package, self.artifact) {
      (Some(p), None) => Ok(PackageOrArtifact::Package(p)),
      (None, Some(a)) => Ok(PackageOrArtifact::Artifact(a)),
      (None, None) => Err(Error::invalid(
        "subject must be either a package or an artifact, got neither",
      )),
      (Some(_), Some(_)) => Err(Error::invalid(
        "subject must be either a package or an artifact, got both",
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exactly_one_arm_is_accepted() {
    let input = PackageOrSourceInput::source(SourceInput::new("git", "github.com", "guac"));
    assert!(matches!(input.discriminate(), Ok(PackageOrSource::Source(_))));
  }

  #[test]
  fn both_arms_are_rejected() {
    let input = PackageOrSourceInput {
      package: Some(PackageInput::new("npm", "", "a").with_version("1").into()),
      source:  Some(SourceInput::new("git", "github.com", "b").into()),
    };
    assert!(matches!(input.discriminate(), Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn neither_arm_is_rejected() {
    let input = PackageOrArtifactInput::default();
    assert!(matches!(input.discriminate(), Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn wire_shape_deserializes_from_optional_arms() {
    let json = r#"{"artifact":{"descriptor":{"algorithm":"sha256","digest":"ab"}}}"#;
    let input: PackageOrArtifactInput = serde_json::from_str(json).unwrap();
    assert!(matches!(
      input.discriminate(),
      Ok(PackageOrArtifact::Artifact(IdOr::Descriptor(_)))
    ));
  }
}
