//! SQL schema for the provgraph SQLite store.
//!
//! Executed once at connection startup. Tables come from [`SCHEMA`]; the
//! unique indexes that drive deduplication are generated from
//! [`crate::keys`] by [`unique_indexes`].

use crate::keys;

/// Table DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Absent optional identity fields (namespace, version, subpath, commit,
/// tag) are stored as `''`, never `NULL`, so they take part in unique keys.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS package_types (
    id   INTEGER PRIMARY KEY,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_namespaces (
    id        INTEGER PRIMARY KEY,
    type_id   INTEGER NOT NULL REFERENCES package_types(id),
    namespace TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_names (
    id           INTEGER PRIMARY KEY,
    namespace_id INTEGER NOT NULL REFERENCES package_namespaces(id),
    name         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_versions (
    id         INTEGER PRIMARY KEY,
    name_id    INTEGER NOT NULL REFERENCES package_names(id),
    version    TEXT NOT NULL,
    subpath    TEXT NOT NULL,
    qualifiers TEXT NOT NULL     -- canonical 'k=v&k=v', sorted
);

CREATE TABLE IF NOT EXISTS source_types (
    id   INTEGER PRIMARY KEY,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source_namespaces (
    id        INTEGER PRIMARY KEY,
    type_id   INTEGER NOT NULL REFERENCES source_types(id),
    namespace TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source_names (
    id           INTEGER PRIMARY KEY,
    namespace_id INTEGER NOT NULL REFERENCES source_namespaces(id),
    name         TEXT NOT NULL,
    commit_hash  TEXT NOT NULL,
    tag          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS artifacts (
    id        INTEGER PRIMARY KEY,
    algorithm TEXT NOT NULL,     -- lower-case
    digest    TEXT NOT NULL      -- lower-case
);

CREATE TABLE IF NOT EXISTS occurrences (
    id            INTEGER PRIMARY KEY,
    artifact_id   INTEGER NOT NULL REFERENCES artifacts(id),
    package_id    INTEGER REFERENCES package_versions(id),
    source_id     INTEGER REFERENCES source_names(id),
    justification TEXT NOT NULL,
    origin        TEXT NOT NULL,
    collector     TEXT NOT NULL,
    CHECK ((package_id IS NULL) <> (source_id IS NULL))
);

CREATE TABLE IF NOT EXISTS dependencies (
    id                   INTEGER PRIMARY KEY,
    package_id           INTEGER NOT NULL REFERENCES package_versions(id),
    dependent_name_id    INTEGER REFERENCES package_names(id),
    dependent_version_id INTEGER REFERENCES package_versions(id),
    version_range        TEXT NOT NULL,
    dependency_type      TEXT NOT NULL,  -- 'DIRECT' | 'INDIRECT' | 'UNKNOWN'
    justification        TEXT NOT NULL,
    origin               TEXT NOT NULL,
    collector            TEXT NOT NULL,
    CHECK ((dependent_name_id IS NULL) <> (dependent_version_id IS NULL))
);

-- Immutable once written; the include tables are filled only on insert.
CREATE TABLE IF NOT EXISTS sboms (
    id                INTEGER PRIMARY KEY,
    package_id        INTEGER REFERENCES package_versions(id),
    artifact_id       INTEGER REFERENCES artifacts(id),
    uri               TEXT NOT NULL,
    algorithm         TEXT NOT NULL,
    digest            TEXT NOT NULL,
    download_location TEXT NOT NULL,
    origin            TEXT NOT NULL,
    collector         TEXT NOT NULL,
    known_since       TEXT NOT NULL,  -- RFC 3339 UTC
    CHECK ((package_id IS NULL) <> (artifact_id IS NULL))
);

CREATE TABLE IF NOT EXISTS sbom_included_packages (
    sbom_id    INTEGER NOT NULL REFERENCES sboms(id),
    package_id INTEGER NOT NULL REFERENCES package_versions(id),
    PRIMARY KEY (sbom_id, package_id)
);

CREATE TABLE IF NOT EXISTS sbom_included_artifacts (
    sbom_id     INTEGER NOT NULL REFERENCES sboms(id),
    artifact_id INTEGER NOT NULL REFERENCES artifacts(id),
    PRIMARY KEY (sbom_id, artifact_id)
);

CREATE TABLE IF NOT EXISTS sbom_included_dependencies (
    sbom_id       INTEGER NOT NULL REFERENCES sboms(id),
    dependency_id INTEGER NOT NULL REFERENCES dependencies(id),
    PRIMARY KEY (sbom_id, dependency_id)
);

CREATE TABLE IF NOT EXISTS sbom_included_occurrences (
    sbom_id       INTEGER NOT NULL REFERENCES sboms(id),
    occurrence_id INTEGER NOT NULL REFERENCES occurrences(id),
    PRIMARY KEY (sbom_id, occurrence_id)
);

CREATE INDEX IF NOT EXISTS occurrences_artifact_idx   ON occurrences(artifact_id);
CREATE INDEX IF NOT EXISTS occurrences_package_idx    ON occurrences(package_id);
CREATE INDEX IF NOT EXISTS occurrences_source_idx     ON occurrences(source_id);
CREATE INDEX IF NOT EXISTS dependencies_package_idx   ON dependencies(package_id);
CREATE INDEX IF NOT EXISTS dependencies_dependent_idx ON dependencies(dependent_name_id);
CREATE INDEX IF NOT EXISTS sboms_package_idx          ON sboms(package_id);
CREATE INDEX IF NOT EXISTS sboms_artifact_idx         ON sboms(artifact_id);

PRAGMA user_version = 1;
";

/// `CREATE UNIQUE INDEX` statements for every natural key scope.
pub fn unique_indexes() -> Vec<String> {
  keys::ALL
    .iter()
    .flat_map(|key| key.scopes())
    .map(|scope| scope.index_ddl())
    .collect()
}
