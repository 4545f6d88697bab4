//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Qualifier lists are stored in
//! canonical form (`k=v&k=v`, sorted, percent-escaped). Absent optional
//! identity fields are stored as `''`.

use chrono::{DateTime, Utc};
use provgraph_core::{
  Id,
  artifact::Artifact,
  dependency::DependencyType,
  package::{PackageNode, PackageVersion, Qualifier},
  purl,
  source::SourceNode,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Qualifiers ──────────────────────────────────────────────────────────────

/// Render already-canonical qualifiers as `k=v&k=v`.
pub fn encode_qualifiers(qualifiers: &[Qualifier]) -> String {
  qualifiers
    .iter()
    .map(|q| format!("{}={}", purl::escape(&q.key), purl::escape(&q.value)))
    .collect::<Vec<_>>()
    .join("&")
}

pub fn decode_qualifiers(s: &str) -> Result<Vec<Qualifier>> {
  s.split('&')
    .filter(|pair| !pair.is_empty())
    .map(|pair| -> Result<Qualifier> {
      let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| Error::corrupt("package_versions", format!("bad qualifier {pair:?}")))?;
      Ok(Qualifier::new(purl::unescape(key)?, purl::unescape(value)?))
    })
    .collect()
}

/// Search fragment for one qualifier inside `'&' || qualifiers || '&'`.
pub fn qualifier_needle(key: &str, value: Option<&str>) -> String {
  match value {
    Some(value) => format!("&{}={}&", purl::escape(key), purl::escape(value)),
    None => format!("&{}=", purl::escape(key)),
  }
}

// ─── DependencyType ──────────────────────────────────────────────────────────

pub fn encode_dependency_type(t: DependencyType) -> String { t.to_string() }

pub fn decode_dependency_type(s: &str) -> Result<DependencyType> {
  s.parse()
    .map_err(|_| Error::corrupt("dependencies", format!("unknown dependency type {s:?}")))
}

// ─── Optional text ───────────────────────────────────────────────────────────

fn non_empty(s: String) -> Option<String> { (!s.is_empty()).then_some(s) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// A package path joined from `package_types` down to `package_names`,
/// optionally with its `package_versions` row.
pub struct RawPackage {
  pub type_id:      i64,
  pub package_type: String,
  pub namespace_id: i64,
  pub namespace:    String,
  pub name_id:      i64,
  pub name:         String,
  pub version:      Option<RawVersion>,
}

pub struct RawVersion {
  pub id:         i64,
  pub version:    String,
  pub qualifiers: String,
  pub subpath:    String,
}

impl RawPackage {
  pub fn into_node(self) -> Result<PackageNode> {
    let version = self
      .version
      .map(|v| {
        Ok::<_, Error>(PackageVersion {
          id:         Id(v.id),
          version:    v.version,
          qualifiers: decode_qualifiers(&v.qualifiers)?,
          subpath:    v.subpath,
        })
      })
      .transpose()?;

    Ok(PackageNode {
      type_id: Id(self.type_id),
      package_type: self.package_type,
      namespace_id: Id(self.namespace_id),
      namespace: self.namespace,
      name_id: Id(self.name_id),
      name: self.name,
      version,
    })
  }
}

pub struct RawSource {
  pub type_id:      i64,
  pub source_type:  String,
  pub namespace_id: i64,
  pub namespace:    String,
  pub name_id:      i64,
  pub name:         String,
  pub commit_hash:  String,
  pub tag:          String,
}

impl RawSource {
  pub fn into_node(self) -> SourceNode {
    SourceNode {
      type_id:      Id(self.type_id),
      source_type:  self.source_type,
      namespace_id: Id(self.namespace_id),
      namespace:    self.namespace,
      name_id:      Id(self.name_id),
      name:         self.name,
      commit:       non_empty(self.commit_hash),
      tag:          non_empty(self.tag),
    }
  }
}

pub struct RawArtifact {
  pub id:        i64,
  pub algorithm: String,
  pub digest:    String,
}

impl RawArtifact {
  pub fn into_artifact(self) -> Artifact {
    Artifact { id: Id(self.id), algorithm: self.algorithm, digest: self.digest }
  }
}

/// An `occurrences` row before its references are hydrated.
pub struct RawOccurrence {
  pub id:            i64,
  pub package_id:    Option<i64>,
  pub source_id:     Option<i64>,
  pub artifact_id:   i64,
  pub justification: String,
  pub origin:        String,
  pub collector:     String,
}

/// A `dependencies` row before its references are hydrated.
pub struct RawDependency {
  pub id:                   i64,
  pub package_id:           i64,
  pub dependent_name_id:    Option<i64>,
  pub dependent_version_id: Option<i64>,
  pub version_range:        String,
  pub dependency_type:      String,
  pub justification:        String,
  pub origin:               String,
  pub collector:            String,
}

/// An `sboms` row before its subject and include sets are hydrated.
pub struct RawSbom {
  pub id:                i64,
  pub package_id:        Option<i64>,
  pub artifact_id:       Option<i64>,
  pub uri:               String,
  pub algorithm:         String,
  pub digest:            String,
  pub download_location: String,
  pub origin:            String,
  pub collector:         String,
  pub known_since:       String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn qualifiers_round_trip_with_reserved_bytes() {
    let qualifiers = vec![
      Qualifier::new("arch", "amd64"),
      Qualifier::new("repository_url", "https://a.example/x?y=1&z=2"),
    ];
    let encoded = encode_qualifiers(&qualifiers);
    assert_eq!(encoded.matches('&').count(), 1);
    assert_eq!(decode_qualifiers(&encoded).unwrap(), qualifiers);
    assert!(decode_qualifiers("").unwrap().is_empty());
  }

  #[test]
  fn needle_matches_whole_pairs_only() {
    let stored = format!("&{}&", encode_qualifiers(&[Qualifier::new("arch", "amd64")]));
    assert!(stored.contains(&qualifier_needle("arch", Some("amd64"))));
    assert!(stored.contains(&qualifier_needle("arch", None)));
    assert!(!stored.contains(&qualifier_needle("arch", Some("amd"))));
    assert!(!stored.contains(&qualifier_needle("ar", None)));
  }
}
