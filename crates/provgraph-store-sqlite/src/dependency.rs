//! Dependency ingestion: a package version depending on a package name (any
//! version) or one specific package version.

use provgraph_core::{
  Id, IdOr,
  dependency::DependencyInput,
  package::PackageInput,
  subject::DependentMatch,
};
use rusqlite::Connection;

use crate::{
  Result,
  encode::encode_dependency_type,
  identity, keys,
  upsert::{ConflictPolicy, Upsert},
};

#[derive(Debug, Clone)]
pub struct Request {
  package:    IdOr<PackageInput>,
  dependent:  IdOr<PackageInput>,
  matching:   DependentMatch,
  dependency: DependencyInput,
}

impl Request {
  pub fn new(
    package: IdOr<PackageInput>,
    dependent: IdOr<PackageInput>,
    matching: DependentMatch,
    dependency: DependencyInput,
  ) -> provgraph_core::Result<Self> {
    identity::check_package_version(&package)?;
    match matching {
      DependentMatch::AllVersions => identity::check_package_name(&dependent)?,
      DependentMatch::SpecificVersion => identity::check_package_version(&dependent)?,
    }
    Ok(Self { package, dependent, matching, dependency })
  }

  /// First writer wins; a repeat ingest resolves to the existing row.
  pub fn ingest(&self, conn: &Connection) -> Result<Id> {
    let package_id = identity::package_version(conn, &self.package)?;
    let dependent_id = match self.matching {
      DependentMatch::AllVersions => identity::package_name(conn, &self.dependent)?,
      DependentMatch::SpecificVersion => identity::package_version(conn, &self.dependent)?,
    };

    let d = &self.dependency;
    let upserted = Upsert::new(keys::DEPENDENCY.scoped_by(&self.matching), ConflictPolicy::Ignore)
      .arm(dependent_id)
      .set("package_id", package_id.0)
      .text("version_range", d.version_range.as_str())
      .text("dependency_type", encode_dependency_type(d.dependency_type))
      .text("justification", d.justification.as_str())
      .text("origin", d.origin.as_str())
      .text("collector", d.collector.as_str())
      .execute(conn)?;
    Ok(upserted.id())
  }
}
