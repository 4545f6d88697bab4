//! Natural keys.
//!
//! Each table that deduplicates its rows has exactly one [`NaturalKey`]. The
//! schema's unique indexes and the upsert engine's conflict targets are both
//! generated from these definitions, so the two cannot drift apart.
//!
//! Relation tables with a polymorphic subject list their alternative foreign
//! keys as `arms`. Every arm gets its own partial unique index over
//! `columns + arm`, restricted to rows where that arm is the one populated.

use provgraph_core::subject::{DependentMatch, PackageOrArtifact, PackageOrSource};

#[derive(Debug)]
pub struct NaturalKey {
  pub table:   &'static str,
  pub columns: &'static [&'static str],
  /// Mutually exclusive foreign keys, in the order of the Rust enum that
  /// selects between them.
  pub arms:    &'static [&'static str],
}

/// A natural key narrowed to one populated arm (or the whole key for
/// tables without arms).
#[derive(Debug, Clone, Copy)]
pub struct Scope {
  pub key: &'static NaturalKey,
  arm:     Option<usize>,
}

impl NaturalKey {
  pub fn unscoped(&'static self) -> Scope {
    debug_assert!(self.arms.is_empty(), "{} has arms", self.table);
    Scope { key: self, arm: None }
  }

  /// The scope selected by a discriminated subject.
  pub fn scoped_by(&'static self, subject: &impl Arm) -> Scope {
    let arm = subject.arm();
    debug_assert!(arm < self.arms.len(), "{} has no arm {arm}", self.table);
    Scope { key: self, arm: Some(arm) }
  }

  /// Every scope, one per arm.
  pub fn scopes(&'static self) -> Vec<Scope> {
    if self.arms.is_empty() {
      vec![self.unscoped()]
    } else {
      (0..self.arms.len()).map(|arm| Scope { key: self, arm: Some(arm) }).collect()
    }
  }
}

impl Scope {
  pub fn table(&self) -> &'static str { self.key.table }

  /// The foreign key column this scope populates.
  pub fn arm_column(&self) -> Option<&'static str> {
    self.arm.map(|arm| self.key.arms[arm])
  }

  /// Conflict target columns: the shared key plus the populated arm.
  pub fn conflict_columns(&self) -> Vec<&'static str> {
    let mut columns = self.key.columns.to_vec();
    columns.extend(self.arm_column());
    columns
  }

  /// `arm IS NOT NULL AND <other arms> IS NULL`.
  pub fn predicate(&self) -> Option<String> {
    let arm = self.arm?;
    let clauses: Vec<String> = self
      .key
      .arms
      .iter()
      .enumerate()
      .map(|(i, column)| {
        if i == arm {
          format!("{column} IS NOT NULL")
        } else {
          format!("{column} IS NULL")
        }
      })
      .collect();
    Some(clauses.join(" AND "))
  }

  pub fn index_name(&self) -> String {
    match self.arm_column() {
      Some(arm) => format!("{}_{arm}_key", self.key.table),
      None => format!("{}_key", self.key.table),
    }
  }

  pub fn index_ddl(&self) -> String {
    let mut ddl = format!(
      "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
      self.index_name(),
      self.key.table,
      self.conflict_columns().join(", "),
    );
    if let Some(predicate) = self.predicate() {
      ddl.push_str(" WHERE ");
      ddl.push_str(&predicate);
    }
    ddl
  }
}

/// Maps a discriminated value to the index of its arm.
pub trait Arm {
  fn arm(&self) -> usize;
}

impl<P, S> Arm for PackageOrSource<P, S> {
  fn arm(&self) -> usize {
    match self {
      PackageOrSource::Package(_) => 0,
      PackageOrSource::Source(_) => 1,
    }
  }
}

impl<P, A> Arm for PackageOrArtifact<P, A> {
  fn arm(&self) -> usize {
    match self {
      PackageOrArtifact::Package(_) => 0,
      PackageOrArtifact::Artifact(_) => 1,
    }
  }
}

impl Arm for DependentMatch {
  fn arm(&self) -> usize {
    match self {
      DependentMatch::AllVersions => 0,
      DependentMatch::SpecificVersion => 1,
    }
  }
}

// ─── Identity tree ───────────────────────────────────────────────────────────

pub static PACKAGE_TYPE: NaturalKey =
  NaturalKey { table: "package_types", columns: &["type"], arms: &[] };

pub static PACKAGE_NAMESPACE: NaturalKey = NaturalKey {
  table:   "package_namespaces",
  columns: &["type_id", "namespace"],
  arms:    &[],
};

pub static PACKAGE_NAME: NaturalKey = NaturalKey {
  table:   "package_names",
  columns: &["namespace_id", "name"],
  arms:    &[],
};

pub static PACKAGE_VERSION: NaturalKey = NaturalKey {
  table:   "package_versions",
  columns: &["name_id", "version", "subpath", "qualifiers"],
  arms:    &[],
};

pub static SOURCE_TYPE: NaturalKey =
  NaturalKey { table: "source_types", columns: &["type"], arms: &[] };

pub static SOURCE_NAMESPACE: NaturalKey = NaturalKey {
  table:   "source_namespaces",
  columns: &["type_id", "namespace"],
  arms:    &[],
};

pub static SOURCE_NAME: NaturalKey = NaturalKey {
  table:   "source_names",
  columns: &["namespace_id", "name", "commit_hash", "tag"],
  arms:    &[],
};

pub static ARTIFACT: NaturalKey =
  NaturalKey { table: "artifacts", columns: &["algorithm", "digest"], arms: &[] };

// ─── Relations ───────────────────────────────────────────────────────────────

pub static OCCURRENCE: NaturalKey = NaturalKey {
  table:   "occurrences",
  columns: &["artifact_id", "justification", "origin", "collector"],
  arms:    &["package_id", "source_id"],
};

pub static DEPENDENCY: NaturalKey = NaturalKey {
  table:   "dependencies",
  columns: &[
    "package_id",
    "version_range",
    "dependency_type",
    "justification",
    "origin",
    "collector",
  ],
  arms:    &["dependent_name_id", "dependent_version_id"],
};

pub static SBOM: NaturalKey = NaturalKey {
  table:   "sboms",
  columns: &["uri", "algorithm", "digest", "download_location", "known_since"],
  arms:    &["package_id", "artifact_id"],
};

pub static ALL: &[&NaturalKey] = &[
  &PACKAGE_TYPE,
  &PACKAGE_NAMESPACE,
  &PACKAGE_NAME,
  &PACKAGE_VERSION,
  &SOURCE_TYPE,
  &SOURCE_NAMESPACE,
  &SOURCE_NAME,
  &ARTIFACT,
  &OCCURRENCE,
  &DEPENDENCY,
  &SBOM,
];
