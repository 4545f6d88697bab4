//! Eager hydration.
//!
//! Loaders take a list of ids and return fully populated values, issuing one
//! batched `IN (...)` query per table rather than one per row. Relation
//! loaders preserve the order of the ids they are given. An id that does
//! not resolve, or a stored reference that dangles, is a corrupt-row error:
//! ids reaching this module come from the store itself.

use std::collections::{BTreeSet, HashMap};

use provgraph_core::{
  Id,
  artifact::Artifact,
  dependency::Dependency,
  occurrence::Occurrence,
  package::PackageNode,
  sbom::HasSbom,
  source::SourceNode,
  subject::{PackageOrArtifact, PackageOrSource},
};
use rusqlite::{Connection, Row};

use crate::{
  Error, Result,
  encode::{
    RawArtifact, RawDependency, RawOccurrence, RawPackage, RawSbom, RawSource, RawVersion,
    decode_dependency_type, decode_dt,
  },
};

/// SQLite's bound-parameter limit is far above this.
const CHUNK: usize = 500;

/// Run `sql` (which must contain one `{ids}` placeholder) for every chunk of
/// `ids`, collecting mapped rows.
fn load<T>(
  conn: &Connection,
  sql: &str,
  ids: &[Id],
  map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
  let mut out = Vec::with_capacity(ids.len());
  for chunk in ids.chunks(CHUNK) {
    let placeholders = vec!["?"; chunk.len()].join(", ");
    let mut stmt = conn.prepare(&sql.replace("{ids}", &placeholders))?;
    let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter().map(|id| id.0)), &map)?;
    for row in rows {
      out.push(row?);
    }
  }
  Ok(out)
}

fn unique(ids: impl IntoIterator<Item = Id>) -> Vec<Id> {
  ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

fn lookup<T: Clone>(
  map: &HashMap<Id, T>,
  table: &'static str,
  what: &str,
  id: Id,
) -> Result<T> {
  map
    .get(&id)
    .cloned()
    .ok_or_else(|| Error::corrupt(table, format!("dangling {what} reference {id}")))
}

/// Re-order loaded rows to match `ids`.
fn in_order<T>(ids: &[Id], mut rows: HashMap<Id, T>, table: &'static str) -> Result<Vec<T>> {
  ids
    .iter()
    .map(|id| rows.remove(id).ok_or_else(|| Error::corrupt(table, format!("no row {id}"))))
    .collect()
}

// ─── Identity nodes ──────────────────────────────────────────────────────────

/// Package version nodes, keyed by version id.
pub fn package_versions(conn: &Connection, ids: &[Id]) -> Result<HashMap<Id, PackageNode>> {
  let sql = "
    SELECT v.id, v.version, v.qualifiers, v.subpath,
           t.id, t.type, ns.id, ns.namespace, n.id, n.name
    FROM package_versions v
    JOIN package_names      n  ON n.id  = v.name_id
    JOIN package_namespaces ns ON ns.id = n.namespace_id
    JOIN package_types      t  ON t.id  = ns.type_id
    WHERE v.id IN ({ids})";

  let raws = load(conn, sql, ids, |row| {
    let version = RawVersion {
      id:         row.get(0)?,
      version:    row.get(1)?,
      qualifiers: row.get(2)?,
      subpath:    row.get(3)?,
    };
    Ok(RawPackage {
      type_id:      row.get(4)?,
      package_type: row.get(5)?,
      namespace_id: row.get(6)?,
      namespace:    row.get(7)?,
      name_id:      row.get(8)?,
      name:         row.get(9)?,
      version:      Some(version),
    })
  })?;

  raws
    .into_iter()
    .map(|raw| -> Result<(Id, PackageNode)> {
      let node = raw.into_node()?;
      Ok((node.id(), node))
    })
    .collect()
}

/// Name-level package nodes, keyed by name id.
pub fn package_names(conn: &Connection, ids: &[Id]) -> Result<HashMap<Id, PackageNode>> {
  let sql = "
    SELECT t.id, t.type, ns.id, ns.namespace, n.id, n.name
    FROM package_names n
    JOIN package_namespaces ns ON ns.id = n.namespace_id
    JOIN package_types      t  ON t.id  = ns.type_id
    WHERE n.id IN ({ids})";

  let raws = load(conn, sql, ids, |row| {
    Ok(RawPackage {
      type_id:      row.get(0)?,
      package_type: row.get(1)?,
      namespace_id: row.get(2)?,
      namespace:    row.get(3)?,
      name_id:      row.get(4)?,
      name:         row.get(5)?,
      version:      None,
    })
  })?;

  raws
    .into_iter()
    .map(|raw| -> Result<(Id, PackageNode)> {
      let node = raw.into_node()?;
      Ok((node.name_id, node))
    })
    .collect()
}

pub fn sources(conn: &Connection, ids: &[Id]) -> Result<HashMap<Id, SourceNode>> {
  let sql = "
    SELECT t.id, t.type, ns.id, ns.namespace, n.id, n.name, n.commit_hash, n.tag
    FROM source_names n
    JOIN source_namespaces ns ON ns.id = n.namespace_id
    JOIN source_types      t  ON t.id  = ns.type_id
    WHERE n.id IN ({ids})";
  let raws = load(conn, sql, ids, |row| {
    Ok(RawSource {
      type_id:      row.get(0)?,
      source_type:  row.get(1)?,
      namespace_id: row.get(2)?,
      namespace:    row.get(3)?,
      name_id:      row.get(4)?,
      name:         row.get(5)?,
      commit_hash:  row.get(6)?,
      tag:          row.get(7)?,
    })
  })?;
  Ok(
    raws
      .into_iter()
      .map(RawSource::into_node)
      .map(|node| (node.name_id, node))
      .collect(),
  )
}

pub fn artifacts(conn: &Connection, ids: &[Id]) -> Result<HashMap<Id, Artifact>> {
  let sql = "SELECT id, algorithm, digest FROM artifacts WHERE id IN ({ids})";
  let raws = load(conn, sql, ids, |row| {
    Ok(RawArtifact { id: row.get(0)?, algorithm: row.get(1)?, digest: row.get(2)? })
  })?;
  Ok(
    raws
      .into_iter()
      .map(RawArtifact::into_artifact)
      .map(|a| (a.id, a))
      .collect(),
  )
}

/// Ordered variants of the node loaders, for node queries.
pub fn package_version_list(conn: &Connection, ids: &[Id]) -> Result<Vec<PackageNode>> {
  in_order(ids, package_versions(conn, ids)?, "package_versions")
}

pub fn source_list(conn: &Connection, ids: &[Id]) -> Result<Vec<SourceNode>> {
  in_order(ids, sources(conn, ids)?, "source_names")
}

pub fn artifact_list(conn: &Connection, ids: &[Id]) -> Result<Vec<Artifact>> {
  in_order(ids, artifacts(conn, ids)?, "artifacts")
}

// ─── Relations ───────────────────────────────────────────────────────────────

pub fn occurrences(conn: &Connection, ids: &[Id]) -> Result<Vec<Occurrence>> {
  let sql = "
    SELECT id, package_id, source_id, artifact_id, justification, origin, collector
    FROM occurrences WHERE id IN ({ids})";
  let raws = load(conn, sql, ids, |row| {
    Ok(RawOccurrence {
      id:            row.get(0)?,
      package_id:    row.get(1)?,
      source_id:     row.get(2)?,
      artifact_id:   row.get(3)?,
      justification: row.get(4)?,
      origin:        row.get(5)?,
      collector:     row.get(6)?,
    })
  })?;

  let packages = package_versions(conn, &unique(raws.iter().filter_map(|r| r.package_id.map(Id))))?;
  let sources = sources(conn, &unique(raws.iter().filter_map(|r| r.source_id.map(Id))))?;
  let artifacts = artifacts(conn, &unique(raws.iter().map(|r| Id(r.artifact_id))))?;

  let mut rows = HashMap::with_capacity(raws.len());
  for raw in raws {
    let subject = match (raw.package_id, raw.source_id) {
      (Some(p), None) => {
        PackageOrSource::Package(lookup(&packages, "occurrences", "package", Id(p))?)
      }
      (None, Some(s)) => {
        PackageOrSource::Source(lookup(&sources, "occurrences", "source", Id(s))?)
      }
      _ => {
        return Err(Error::corrupt("occurrences", format!("row {} has no single subject", raw.id)));
      }
    };
    let occurrence = Occurrence {
      id: Id(raw.id),
      subject,
      artifact: lookup(&artifacts, "occurrences", "artifact", Id(raw.artifact_id))?,
      justification: raw.justification,
      origin: raw.origin,
      collector: raw.collector,
    };
    rows.insert(occurrence.id, occurrence);
  }
  in_order(ids, rows, "occurrences")
}

pub fn dependencies(conn: &Connection, ids: &[Id]) -> Result<Vec<Dependency>> {
  let sql = "
    SELECT id, package_id, dependent_name_id, dependent_version_id, version_range,
           dependency_type, justification, origin, collector
    FROM dependencies WHERE id IN ({ids})";
  let raws = load(conn, sql, ids, |row| {
    Ok(RawDependency {
      id:                   row.get(0)?,
      package_id:           row.get(1)?,
      dependent_name_id:    row.get(2)?,
      dependent_version_id: row.get(3)?,
      version_range:        row.get(4)?,
      dependency_type:      row.get(5)?,
      justification:        row.get(6)?,
      origin:               row.get(7)?,
      collector:            row.get(8)?,
    })
  })?;

  let versions = package_versions(
    conn,
    &unique(
      raws
        .iter()
        .flat_map(|r| [Some(r.package_id), r.dependent_version_id])
        .flatten()
        .map(Id),
    ),
  )?;
  let names =
    package_names(conn, &unique(raws.iter().filter_map(|r| r.dependent_name_id.map(Id))))?;

  let mut rows = HashMap::with_capacity(raws.len());
  for raw in raws {
    let dependent = match (raw.dependent_name_id, raw.dependent_version_id) {
      (Some(n), None) => lookup(&names, "dependencies", "package name", Id(n))?,
      (None, Some(v)) => lookup(&versions, "dependencies", "package version", Id(v))?,
      _ => {
        return Err(Error::corrupt(
          "dependencies",
          format!("row {} has no single dependent", raw.id),
        ));
      }
    };
    let dependency = Dependency {
      id: Id(raw.id),
      package: lookup(&versions, "dependencies", "package", Id(raw.package_id))?,
      dependent,
      version_range: raw.version_range,
      dependency_type: decode_dependency_type(&raw.dependency_type)?,
      justification: raw.justification,
      origin: raw.origin,
      collector: raw.collector,
    };
    rows.insert(dependency.id, dependency);
  }
  in_order(ids, rows, "dependencies")
}

/// `(sbom_id, member_id)` pairs from one include table.
fn members(conn: &Connection, join: &str, member: &str, ids: &[Id]) -> Result<Vec<(Id, Id)>> {
  let sql = format!(
    "SELECT sbom_id, {member} FROM {join} WHERE sbom_id IN ({{ids}}) ORDER BY sbom_id, {member}"
  );
  load(conn, &sql, ids, |row| Ok((Id(row.get(0)?), Id(row.get(1)?))))
}

fn group(pairs: &[(Id, Id)]) -> HashMap<Id, Vec<Id>> {
  let mut grouped: HashMap<Id, Vec<Id>> = HashMap::new();
  for (sbom, member) in pairs {
    grouped.entry(*sbom).or_default().push(*member);
  }
  grouped
}

pub fn sboms(conn: &Connection, ids: &[Id]) -> Result<Vec<HasSbom>> {
  let sql = "
    SELECT id, package_id, artifact_id, uri, algorithm, digest, download_location,
           origin, collector, known_since
    FROM sboms WHERE id IN ({ids})";
  let raws = load(conn, sql, ids, |row| {
    Ok(RawSbom {
      id:                row.get(0)?,
      package_id:        row.get(1)?,
      artifact_id:       row.get(2)?,
      uri:               row.get(3)?,
      algorithm:         row.get(4)?,
      digest:            row.get(5)?,
      download_location: row.get(6)?,
      origin:            row.get(7)?,
      collector:         row.get(8)?,
      known_since:       row.get(9)?,
    })
  })?;

  let inc_packages = members(conn, "sbom_included_packages", "package_id", ids)?;
  let inc_artifacts = members(conn, "sbom_included_artifacts", "artifact_id", ids)?;
  let inc_dependencies = members(conn, "sbom_included_dependencies", "dependency_id", ids)?;
  let inc_occurrences = members(conn, "sbom_included_occurrences", "occurrence_id", ids)?;

  let packages = package_versions(
    conn,
    &unique(
      raws
        .iter()
        .filter_map(|r| r.package_id.map(Id))
        .chain(inc_packages.iter().map(|(_, m)| *m)),
    ),
  )?;
  let artifacts = artifacts(
    conn,
    &unique(
      raws
        .iter()
        .filter_map(|r| r.artifact_id.map(Id))
        .chain(inc_artifacts.iter().map(|(_, m)| *m)),
    ),
  )?;
  let dependencies: HashMap<Id, Dependency> =
    dependencies(conn, &unique(inc_dependencies.iter().map(|(_, m)| *m)))?
      .into_iter()
      .map(|d| (d.id, d))
      .collect();
  let occurrences: HashMap<Id, Occurrence> =
    occurrences(conn, &unique(inc_occurrences.iter().map(|(_, m)| *m)))?
      .into_iter()
      .map(|o| (o.id, o))
      .collect();

  let (inc_packages, inc_artifacts, inc_dependencies, inc_occurrences) = (
    group(&inc_packages),
    group(&inc_artifacts),
    group(&inc_dependencies),
    group(&inc_occurrences),
  );
  let resolve = |grouped: &HashMap<Id, Vec<Id>>, sbom: Id| -> Vec<Id> {
    grouped.get(&sbom).cloned().unwrap_or_default()
  };

  let mut rows = HashMap::with_capacity(raws.len());
  for raw in raws {
    let id = Id(raw.id);
    let subject = match (raw.package_id, raw.artifact_id) {
      (Some(p), None) => PackageOrArtifact::Package(lookup(&packages, "sboms", "package", Id(p))?),
      (None, Some(a)) => {
        PackageOrArtifact::Artifact(lookup(&artifacts, "sboms", "artifact", Id(a))?)
      }
      _ => return Err(Error::corrupt("sboms", format!("row {id} has no single subject"))),
    };

    let sbom = HasSbom {
      id,
      subject,
      uri: raw.uri,
      algorithm: raw.algorithm,
      digest: raw.digest,
      download_location: raw.download_location,
      origin: raw.origin,
      collector: raw.collector,
      known_since: decode_dt(&raw.known_since)?,
      included_packages: resolve(&inc_packages, id)
        .into_iter()
        .map(|m| lookup(&packages, "sbom_included_packages", "package", m))
        .collect::<Result<_>>()?,
      included_artifacts: resolve(&inc_artifacts, id)
        .into_iter()
        .map(|m| lookup(&artifacts, "sbom_included_artifacts", "artifact", m))
        .collect::<Result<_>>()?,
      included_dependencies: resolve(&inc_dependencies, id)
        .into_iter()
        .map(|m| lookup(&dependencies, "sbom_included_dependencies", "dependency", m))
        .collect::<Result<_>>()?,
      included_occurrences: resolve(&inc_occurrences, id)
        .into_iter()
        .map(|m| lookup(&occurrences, "sbom_included_occurrences", "occurrence", m))
        .collect::<Result<_>>()?,
    };
    rows.insert(id, sbom);
  }
  in_order(ids, rows, "sboms")
}
