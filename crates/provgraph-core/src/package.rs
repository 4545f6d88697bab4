//! Packages: the `type → namespace → name → version` identity tree.
//!
//! A version's identity is its full path plus qualifiers and subpath. An
//! absent namespace, version or subpath is canonically the empty string so
//! the store never has to distinguish `NULL` from `""` in a unique key.

use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A single `key=value` package qualifier (e.g. `arch=amd64`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qualifier {
  pub key:   String,
  pub value: String,
}

impl Qualifier {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self { key: key.into(), value: value.into() }
  }
}

/// Describes a package at name level (no version) or version level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInput {
  #[serde(rename = "type")]
  pub package_type: String,
  #[serde(default)]
  pub namespace:    Option<String>,
  pub name:         String,
  #[serde(default)]
  pub version:      Option<String>,
  #[serde(default)]
  pub qualifiers:   Vec<Qualifier>,
  #[serde(default)]
  pub subpath:      Option<String>,
}

impl PackageInput {
  pub fn new(
    package_type: impl Into<String>,
    namespace: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      package_type: package_type.into(),
      namespace: Some(namespace.into()),
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn with_qualifier(
    mut self,
    key: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.qualifiers.push(Qualifier::new(key, value));
    self
  }

  /// Namespace with the empty-string canonical form for "none".
  pub fn namespace_or_empty(&self) -> &str { self.namespace.as_deref().unwrap_or("") }

  pub fn subpath_or_empty(&self) -> &str { self.subpath.as_deref().unwrap_or("") }

  /// Qualifiers sorted by key, then value, with exact duplicates removed.
  pub fn canonical_qualifiers(&self) -> Vec<Qualifier> {
    let mut qualifiers = self.qualifiers.clone();
    qualifiers.sort();
    qualifiers.dedup();
    qualifiers
  }

  /// Check the fields required for name-level resolution.
  pub fn validate_name(&self) -> Result<()> {
    if self.package_type.is_empty() {
      return Err(Error::invalid("package type must not be empty"));
    }
    if self.name.is_empty() {
      return Err(Error::invalid("package name must not be empty"));
    }
    if self.qualifiers.iter().any(|q| q.key.is_empty()) {
      return Err(Error::invalid("package qualifier keys must not be empty"));
    }
    Ok(())
  }

  /// Check the fields required for version-level resolution.
  pub fn validate_version(&self) -> Result<()> {
    self.validate_name()?;
    match self.version.as_deref() {
      None => Err(Error::invalid(format!(
        "package {}/{} has no version; a version-level reference needs one",
        self.package_type, self.name
      ))),
      Some("") => Err(Error::invalid(format!(
        "package {}/{} has an empty version",
        self.package_type, self.name
      ))),
      Some(_) => Ok(()),
    }
  }
}

/// Identifiers of every level of a resolved package path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIds {
  pub type_id:      Id,
  pub namespace_id: Id,
  pub name_id:      Id,
  pub version_id:   Id,
}

// ─── Hydrated nodes ──────────────────────────────────────────────────────────

/// A package node hydrated from type down to (optionally) version.
///
/// `version` is `None` for name-level nodes, e.g. the dependent of a
/// dependency that matches all versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageNode {
  pub type_id:      Id,
  #[serde(rename = "type")]
  pub package_type: String,
  pub namespace_id: Id,
  pub namespace:    String,
  pub name_id:      Id,
  pub name:         String,
  pub version:      Option<PackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
  pub id:         Id,
  pub version:    String,
  pub qualifiers: Vec<Qualifier>,
  pub subpath:    String,
}

impl PackageNode {
  /// The id of the deepest hydrated level.
  pub fn id(&self) -> Id {
    self.version.as_ref().map_or(self.name_id, |v| v.id)
  }

  /// Render this node as a package URL.
  pub fn purl(&self) -> String { crate::purl::render(self) }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Match on a qualifier key, optionally with an exact value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierFilter {
  pub key:   String,
  #[serde(default)]
  pub value: Option<String>,
}

/// Filter over package nodes. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageFilter {
  pub id:                          Option<Id>,
  #[serde(rename = "type")]
  pub package_type:                Option<String>,
  pub namespace:                   Option<String>,
  pub name:                        Option<String>,
  pub version:                     Option<String>,
  pub subpath:                     Option<String>,
  pub qualifiers:                  Vec<QualifierFilter>,
  /// Only match versions that carry no qualifiers at all.
  pub match_only_empty_qualifiers: bool,
}

impl PackageFilter {
  /// A filter matching a name exactly, under an optional type/namespace.
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: Some(name.into()), ..Default::default() }
  }

  /// Build an exact-match filter from a descriptor.
  pub fn from_input(input: &PackageInput) -> Self {
    Self {
      id:                          None,
      package_type:                Some(input.package_type.clone()),
      namespace:                   Some(input.namespace_or_empty().to_owned()),
      name:                        Some(input.name.clone()),
      version:                     input.version.clone(),
      subpath:                     input.subpath.clone(),
      qualifiers:                  input
        .qualifiers
        .iter()
        .map(|q| QualifierFilter { key: q.key.clone(), value: Some(q.value.clone()) })
        .collect(),
      match_only_empty_qualifiers: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_qualifiers_are_sorted_and_deduplicated() {
    let input = PackageInput::new("deb", "debian", "curl")
      .with_version("7.88")
      .with_qualifier("distro", "bookworm")
      .with_qualifier("arch", "amd64")
      .with_qualifier("distro", "bookworm");

    let q = input.canonical_qualifiers();
    assert_eq!(q, vec![
      Qualifier::new("arch", "amd64"),
      Qualifier::new("distro", "bookworm"),
    ]);
  }

  #[test]
  fn version_level_requires_a_version() {
    let input = PackageInput::new("npm", "", "left-pad");
    assert!(input.validate_name().is_ok());
    assert!(matches!(
      input.validate_version(),
      Err(Error::InvalidArgument(_))
    ));
  }

  #[test]
  fn empty_version_is_rejected() {
    let input = PackageInput::new("npm", "", "left-pad").with_version("");
    assert!(matches!(
      input.validate_version(),
      Err(Error::InvalidArgument(_))
    ));
  }

  #[test]
  fn empty_name_is_rejected() {
    let input = PackageInput::new("npm", "", "");
    assert!(input.validate_name().is_err());
  }
}
