//! Filter compilation.
//!
//! Each function turns one filter type into a [`Predicate`] over the table
//! holding that entity. Fields within a filter are conjunctive; nested
//! filters become `EXISTS` traversals. A package filter that may match
//! either a package name or a package version (a dependency's dependent
//! without a version) compiles to a disjunction over both.

use provgraph_core::{
  artifact::ArtifactFilter,
  dependency::DependencyFilter,
  occurrence::OccurrenceFilter,
  package::PackageFilter,
  sbom::SbomFilter,
  source::SourceFilter,
  subject::{PackageOrArtifact, PackageOrSource},
};

use crate::{
  encode::{encode_dependency_type, encode_dt, qualifier_needle},
  predicate::{Link, Predicate, Terms},
};

const TO_TYPE: Link = Link::Parent { table: "package_types", column: "type_id" };
const TO_NAMESPACE: Link = Link::Parent { table: "package_namespaces", column: "namespace_id" };
const TO_NAME: Link = Link::Parent { table: "package_names", column: "name_id" };

// ─── Packages ────────────────────────────────────────────────────────────────

fn package_namespace(filter: &PackageFilter) -> Predicate {
  let mut terms = Terms::default();
  terms.text("namespace", filter.namespace.as_ref()).exists(
    TO_TYPE,
    Predicate::all(filter.package_type.as_deref().map(|t| Predicate::text("type", t))),
  );
  terms.build()
}

/// Name-level fields only; `with_id` applies the filter id to this level.
fn package_name_fields(filter: &PackageFilter, with_id: bool) -> Predicate {
  let mut terms = Terms::default();
  if with_id {
    terms.id(filter.id);
  }
  terms
    .text("name", filter.name.as_ref())
    .exists(TO_NAMESPACE, package_namespace(filter));
  terms.build()
}

/// Whether the filter constrains anything that only a version row has.
fn is_version_level(filter: &PackageFilter) -> bool {
  filter.version.is_some()
    || filter.subpath.is_some()
    || !filter.qualifiers.is_empty()
    || filter.match_only_empty_qualifiers
}

/// Predicate over `package_versions`.
pub fn package_version(filter: &PackageFilter) -> Predicate {
  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("version", filter.version.as_ref())
    .text("subpath", filter.subpath.as_ref());
  for q in &filter.qualifiers {
    terms.push(Predicate::ListContains(
      "qualifiers",
      qualifier_needle(&q.key, q.value.as_deref()),
    ));
  }
  if filter.match_only_empty_qualifiers {
    terms.push(Predicate::text("qualifiers", ""));
  }
  terms.exists(TO_NAME, package_name_fields(filter, false));
  terms.build()
}

/// Predicate over `package_names`.
pub fn package_name(filter: &PackageFilter) -> Predicate { package_name_fields(filter, true) }

/// Predicate over a row holding a name arm and a version arm.
fn package_name_or_version(
  filter: &PackageFilter,
  name_column: &'static str,
  version_column: &'static str,
) -> Predicate {
  let by_version = Predicate::exists(
    Link::Parent { table: "package_versions", column: version_column },
    package_version(filter),
  );
  if is_version_level(filter) {
    return by_version;
  }
  let by_name = Predicate::exists(
    Link::Parent { table: "package_names", column: name_column },
    package_name(filter),
  );
  Predicate::Or(vec![by_name, by_version])
}

// ─── Sources and artifacts ───────────────────────────────────────────────────

/// Predicate over `source_names`.
pub fn source(filter: &SourceFilter) -> Predicate {
  let mut namespace = Terms::default();
  namespace.text("namespace", filter.namespace.as_ref()).exists(
    Link::Parent { table: "source_types", column: "type_id" },
    Predicate::all(filter.source_type.as_deref().map(|t| Predicate::text("type", t))),
  );

  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("name", filter.name.as_ref())
    .text("commit_hash", filter.commit.as_ref())
    .text("tag", filter.tag.as_ref())
    .exists(
      Link::Parent { table: "source_namespaces", column: "namespace_id" },
      namespace.build(),
    );
  terms.build()
}

/// Predicate over `artifacts`. Values are lower-cased like stored ones.
pub fn artifact(filter: &ArtifactFilter) -> Predicate {
  let algorithm = filter.algorithm.as_ref().map(|a| a.to_lowercase());
  let digest = filter.digest.as_ref().map(|d| d.to_lowercase());
  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("algorithm", algorithm.as_ref())
    .text("digest", digest.as_ref());
  terms.build()
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// Predicate over `occurrences`.
pub fn occurrence(filter: &OccurrenceFilter) -> Predicate {
  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("justification", filter.justification.as_ref())
    .text("origin", filter.origin.as_ref())
    .text("collector", filter.collector.as_ref());

  match &filter.subject {
    Some(PackageOrSource::Package(p)) => {
      terms.push(Predicate::exists(
        Link::Parent { table: "package_versions", column: "package_id" },
        package_version(p),
      ));
    }
    Some(PackageOrSource::Source(s)) => {
      terms.push(Predicate::exists(
        Link::Parent { table: "source_names", column: "source_id" },
        source(s),
      ));
    }
    None => {}
  }
  if let Some(a) = &filter.artifact {
    terms.exists(Link::Parent { table: "artifacts", column: "artifact_id" }, artifact(a));
  }
  terms.build()
}

/// Predicate over `dependencies`.
pub fn dependency(filter: &DependencyFilter) -> Predicate {
  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("version_range", filter.version_range.as_ref())
    .text("justification", filter.justification.as_ref())
    .text("origin", filter.origin.as_ref())
    .text("collector", filter.collector.as_ref());
  if let Some(t) = filter.dependency_type {
    terms.push(Predicate::text("dependency_type", &encode_dependency_type(t)));
  }
  if let Some(p) = &filter.package {
    terms.exists(
      Link::Parent { table: "package_versions", column: "package_id" },
      package_version(p),
    );
  }
  if let Some(d) = &filter.dependency_package {
    terms.push(package_name_or_version(d, "dependent_name_id", "dependent_version_id"));
  }
  terms.build()
}

/// Predicate over `sboms`. Algorithm and digest are lower-cased like stored
/// ones.
pub fn sbom(filter: &SbomFilter) -> Predicate {
  let algorithm = filter.algorithm.as_ref().map(|a| a.to_lowercase());
  let digest = filter.digest.as_ref().map(|d| d.to_lowercase());
  let known_since = filter.known_since.map(encode_dt);
  let mut terms = Terms::default();
  terms
    .id(filter.id)
    .text("uri", filter.uri.as_ref())
    .text("algorithm", algorithm.as_ref())
    .text("digest", digest.as_ref())
    .text("download_location", filter.download_location.as_ref())
    .text("origin", filter.origin.as_ref())
    .text("collector", filter.collector.as_ref())
    .text("known_since", known_since.as_ref());

  match &filter.subject {
    Some(PackageOrArtifact::Package(p)) => {
      terms.push(Predicate::exists(
        Link::Parent { table: "package_versions", column: "package_id" },
        package_version(p),
      ));
    }
    Some(PackageOrArtifact::Artifact(a)) => {
      terms.push(Predicate::exists(
        Link::Parent { table: "artifacts", column: "artifact_id" },
        artifact(a),
      ));
    }
    None => {}
  }

  for software in &filter.included_software {
    terms.push(match software {
      PackageOrArtifact::Package(p) => Predicate::exists(
        included("sbom_included_packages", "package_id", "package_versions"),
        package_version(p),
      ),
      PackageOrArtifact::Artifact(a) => Predicate::exists(
        included("sbom_included_artifacts", "artifact_id", "artifacts"),
        artifact(a),
      ),
    });
  }
  for d in &filter.included_dependencies {
    terms.push(Predicate::exists(
      included("sbom_included_dependencies", "dependency_id", "dependencies"),
      dependency(d),
    ));
  }
  for o in &filter.included_occurrences {
    terms.push(Predicate::exists(
      included("sbom_included_occurrences", "occurrence_id", "occurrences"),
      occurrence(o),
    ));
  }
  terms.build()
}

fn included(join: &'static str, member: &'static str, table: &'static str) -> Link {
  Link::Through { join, owner: "sbom_id", member, table }
}

#[cfg(test)]
mod tests {
  use provgraph_core::package::QualifierFilter;

  use super::*;
  use crate::predicate::Select;

  #[test]
  fn empty_filter_matches_everything() {
    assert!(occurrence(&OccurrenceFilter::default()).is_true());
    assert!(sbom(&SbomFilter::default()).is_true());
  }

  #[test]
  fn dependent_without_version_is_a_disjunction() {
    let filter = DependencyFilter {
      dependency_package: Some(PackageFilter::named("left-pad")),
      ..Default::default()
    };
    assert!(matches!(dependency(&filter), Predicate::Or(ref arms) if arms.len() == 2));

    let versioned = DependencyFilter {
      dependency_package: Some(PackageFilter {
        version: Some("1.0.0".into()),
        ..PackageFilter::named("left-pad")
      }),
      ..Default::default()
    };
    assert!(matches!(dependency(&versioned), Predicate::Exists(..)));
  }

  #[test]
  fn qualifier_filters_render_as_fragment_searches() {
    let filter = PackageFilter {
      qualifiers: vec![QualifierFilter { key: "arch".into(), value: Some("amd64".into()) }],
      ..Default::default()
    };
    let select = Select::ids("package_versions", &package_version(&filter), 10);
    assert!(select.sql.contains("instr('&' || t0.qualifiers || '&', ?) > 0"));
    assert_eq!(select.params.len(), 1);
  }

  #[test]
  fn included_sets_traverse_join_tables() {
    let filter = SbomFilter {
      included_dependencies: vec![DependencyFilter {
        justification: Some("lockfile".into()),
        ..Default::default()
      }],
      ..Default::default()
    };
    let select = Select::ids("sboms", &sbom(&filter), 10);
    assert!(select.sql.contains(
      "FROM sbom_included_dependencies t1 JOIN dependencies t2 ON t2.id = t1.dependency_id"
    ));
  }
}
