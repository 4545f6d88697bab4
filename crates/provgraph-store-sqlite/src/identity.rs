//! Identity resolver.
//!
//! Turns package, source and artifact references into row ids. Descriptors
//! for the package and source trees are find-or-create: every level is a
//! merge upsert keyed on its full path, so concurrent resolution of the same
//! path converges on one row per level. Artifacts referenced from relations
//! are looked up only. Plain ids must name an existing row of the expected
//! table.
//!
//! All functions take the caller's connection (normally an open
//! transaction) so identity resolution commits or rolls back together with
//! the relation that needed it.

use provgraph_core::{
  Id, IdOr,
  artifact::ArtifactInput,
  package::{PackageIds, PackageInput},
  source::{SourceIds, SourceInput},
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::encode_qualifiers,
  keys,
  upsert::{ConflictPolicy::Merge, Upsert},
};

// ─── Validation (no store access) ────────────────────────────────────────────

pub fn check_package_version(r: &IdOr<PackageInput>) -> provgraph_core::Result<()> {
  r.as_descriptor().map_or(Ok(()), PackageInput::validate_version)
}

pub fn check_package_name(r: &IdOr<PackageInput>) -> provgraph_core::Result<()> {
  r.as_descriptor().map_or(Ok(()), PackageInput::validate_name)
}

pub fn check_source(r: &IdOr<SourceInput>) -> provgraph_core::Result<()> {
  r.as_descriptor().map_or(Ok(()), SourceInput::validate)
}

pub fn check_artifact(r: &IdOr<ArtifactInput>) -> provgraph_core::Result<()> {
  r.as_descriptor().map_or(Ok(()), |a| a.normalized().map(drop))
}

// ─── Existence ───────────────────────────────────────────────────────────────

/// Fail with not-found unless `table` has a row with this id.
pub fn require(conn: &Connection, table: &str, entity: &'static str, id: Id) -> Result<Id> {
  let found = conn
    .prepare_cached(&format!("SELECT 1 FROM {table} WHERE id = ?1"))?
    .query_row([id.0], |_| Ok(()))
    .optional()?;
  match found {
    Some(()) => Ok(id),
    None => Err(provgraph_core::Error::not_found(entity, id).into()),
  }
}

// ─── Packages ────────────────────────────────────────────────────────────────

struct NameIds {
  type_id:      Id,
  namespace_id: Id,
  name_id:      Id,
}

fn ensure_package_name(conn: &Connection, input: &PackageInput) -> Result<NameIds> {
  input.validate_name()?;

  let type_id = Upsert::new(keys::PACKAGE_TYPE.unscoped(), Merge)
    .text("type", input.package_type.as_str())
    .execute(conn)?
    .id();
  let namespace_id = Upsert::new(keys::PACKAGE_NAMESPACE.unscoped(), Merge)
    .set("type_id", type_id.0)
    .text("namespace", input.namespace_or_empty())
    .execute(conn)?
    .id();
  let name_id = Upsert::new(keys::PACKAGE_NAME.unscoped(), Merge)
    .set("namespace_id", namespace_id.0)
    .text("name", input.name.as_str())
    .execute(conn)?
    .id();

  Ok(NameIds { type_id, namespace_id, name_id })
}

/// Find or create a version-level package path.
pub fn ensure_package(conn: &Connection, input: &PackageInput) -> Result<PackageIds> {
  input.validate_version()?;
  let NameIds { type_id, namespace_id, name_id } = ensure_package_name(conn, input)?;

  let version_id = Upsert::new(keys::PACKAGE_VERSION.unscoped(), Merge)
    .set("name_id", name_id.0)
    .text("version", input.version.clone().unwrap_or_default())
    .text("subpath", input.subpath_or_empty())
    .text("qualifiers", encode_qualifiers(&input.canonical_qualifiers()))
    .execute(conn)?
    .id();

  tracing::debug!(package = %input.name, %version_id, "resolved package version");
  Ok(PackageIds { type_id, namespace_id, name_id, version_id })
}

/// Resolve a reference to a package-version id.
pub fn package_version(conn: &Connection, r: &IdOr<PackageInput>) -> Result<Id> {
  match r {
    IdOr::Id(id) => require(conn, "package_versions", "package version", *id),
    IdOr::Descriptor(input) => Ok(ensure_package(conn, input)?.version_id),
  }
}

/// Resolve a reference to a package-name id. A descriptor's version, if
/// any, is ignored.
pub fn package_name(conn: &Connection, r: &IdOr<PackageInput>) -> Result<Id> {
  match r {
    IdOr::Id(id) => require(conn, "package_names", "package name", *id),
    IdOr::Descriptor(input) => Ok(ensure_package_name(conn, input)?.name_id),
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

pub fn ensure_source(conn: &Connection, input: &SourceInput) -> Result<SourceIds> {
  input.validate()?;

  let type_id = Upsert::new(keys::SOURCE_TYPE.unscoped(), Merge)
    .text("type", input.source_type.as_str())
    .execute(conn)?
    .id();
  let namespace_id = Upsert::new(keys::SOURCE_NAMESPACE.unscoped(), Merge)
    .set("type_id", type_id.0)
    .text("namespace", input.namespace.as_str())
    .execute(conn)?
    .id();
  let name_id = Upsert::new(keys::SOURCE_NAME.unscoped(), Merge)
    .set("namespace_id", namespace_id.0)
    .text("name", input.name.as_str())
    .text("commit_hash", input.commit.clone().unwrap_or_default())
    .text("tag", input.tag.clone().unwrap_or_default())
    .execute(conn)?
    .id();

  tracing::debug!(source = %input.name, %name_id, "resolved source");
  Ok(SourceIds { type_id, namespace_id, name_id })
}

pub fn source(conn: &Connection, r: &IdOr<SourceInput>) -> Result<Id> {
  match r {
    IdOr::Id(id) => require(conn, "source_names", "source", *id),
    IdOr::Descriptor(input) => Ok(ensure_source(conn, input)?.name_id),
  }
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

pub fn ensure_artifact(conn: &Connection, input: &ArtifactInput) -> Result<Id> {
  let input = input.normalized()?;
  Ok(
    Upsert::new(keys::ARTIFACT.unscoped(), Merge)
      .text("algorithm", input.algorithm)
      .text("digest", input.digest)
      .execute(conn)?
      .id(),
  )
}

/// Look up an existing artifact; relations never create artifacts.
pub fn artifact(conn: &Connection, r: &IdOr<ArtifactInput>) -> Result<Id> {
  let input = match r {
    IdOr::Id(id) => return require(conn, "artifacts", "artifact", *id),
    IdOr::Descriptor(input) => input.normalized()?,
  };
  conn
    .prepare_cached("SELECT id FROM artifacts WHERE algorithm = ?1 AND digest = ?2")?
    .query_row([&input.algorithm, &input.digest], |row| row.get(0))
    .optional()?
    .map(Id)
    .ok_or_else(|| {
      provgraph_core::Error::not_found(
        "artifact",
        format!("{}:{}", input.algorithm, input.digest),
      )
      .into()
    })
}
