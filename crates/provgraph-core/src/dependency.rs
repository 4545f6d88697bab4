//! Dependency: a package version depending on a package name or version.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Id,
  package::{PackageFilter, PackageNode},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
  Direct,
  Indirect,
  #[default]
  Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyInput {
  pub version_range:   String,
  pub dependency_type: DependencyType,
  pub justification:   String,
  pub origin:          String,
  pub collector:       String,
}

impl DependencyInput {
  pub fn new(
    dependency_type: DependencyType,
    justification: impl Into<String>,
    origin: impl Into<String>,
    collector: impl Into<String>,
  ) -> Self {
    Self {
      version_range: String::new(),
      dependency_type,
      justification: justification.into(),
      origin: origin.into(),
      collector: collector.into(),
    }
  }

  pub fn with_range(mut self, range: impl Into<String>) -> Self {
    self.version_range = range.into();
    self
  }
}

/// A stored dependency. `dependent.version` is `None` when the dependency
/// matches every version of the dependent package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
  pub id:              Id,
  pub package:         PackageNode,
  pub dependent:       PackageNode,
  pub version_range:   String,
  pub dependency_type: DependencyType,
  pub justification:   String,
  pub origin:          String,
  pub collector:       String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyFilter {
  pub id:                 Option<Id>,
  /// The depending package.
  pub package:            Option<PackageFilter>,
  /// The dependent. Without a version this matches name-level and
  /// version-level dependents alike.
  pub dependency_package: Option<PackageFilter>,
  pub version_range:      Option<String>,
  pub dependency_type:    Option<DependencyType>,
  pub justification:      Option<String>,
  pub origin:             Option<String>,
  pub collector:          Option<String>,
}
