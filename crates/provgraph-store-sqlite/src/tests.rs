//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeZone as _, Utc};
use provgraph_core::{
  Classify as _, ErrorKind, Id, IdOr,
  artifact::{ArtifactFilter, ArtifactInput},
  dependency::{DependencyFilter, DependencyInput, DependencyType},
  occurrence::{OccurrenceFilter, OccurrenceInput},
  package::{PackageFilter, PackageInput, QualifierFilter},
  sbom::{SbomFilter, SbomIncludes, SbomInput},
  source::{SourceFilter, SourceInput},
  store::GraphStore,
  subject::{DependentMatch, PackageOrArtifact, PackageOrArtifactInput, PackageOrSource, PackageOrSourceInput},
};
use tokio_util::sync::CancellationToken;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn curl() -> PackageInput {
  PackageInput::new("deb", "debian", "curl")
    .with_version("7.88.1")
    .with_qualifier("distro", "bookworm")
    .with_qualifier("arch", "amd64")
}

fn left_pad(version: &str) -> PackageInput {
  PackageInput::new("npm", "", "left-pad").with_version(version)
}

fn guac() -> SourceInput {
  SourceInput::new("git", "github.com/guacsec", "guac").with_tag("v0.1.0")
}

fn digest(hex: &str) -> ArtifactInput { ArtifactInput::new("sha256", hex) }

fn scan() -> OccurrenceInput { OccurrenceInput::new("found in image", "scanner", "test") }

fn direct() -> DependencyInput {
  DependencyInput::new(DependencyType::Direct, "lockfile", "deps.dev", "test")
}

fn sbom_doc(uri: &str) -> SbomInput {
  SbomInput {
    uri:               uri.into(),
    algorithm:         "sha256".into(),
    digest:            "0f0f".into(),
    download_location: format!("{uri}/download"),
    origin:            "spdx".into(),
    collector:         "test".into(),
    known_since:       Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
  }
}

// ─── Identity tree ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_package_is_idempotent_across_qualifier_order() {
  let s = store().await;

  let a = s.ingest_package(curl()).await.unwrap();
  let reordered = PackageInput::new("deb", "debian", "curl")
    .with_version("7.88.1")
    .with_qualifier("arch", "amd64")
    .with_qualifier("distro", "bookworm");
  let b = s.ingest_package(reordered).await.unwrap();

  assert_eq!(a, b);
  assert_eq!(s.row_count("package_versions").await.unwrap(), 1);
  assert_eq!(s.row_count("package_names").await.unwrap(), 1);
}

#[tokio::test]
async fn packages_share_ancestors() {
  let s = store().await;

  let one = s.ingest_package(left_pad("1.0.0")).await.unwrap();
  let two = s.ingest_package(left_pad("1.3.0")).await.unwrap();

  assert_eq!(one.name_id, two.name_id);
  assert_eq!(one.namespace_id, two.namespace_id);
  assert_ne!(one.version_id, two.version_id);
  assert_eq!(s.row_count("package_namespaces").await.unwrap(), 1);
}

#[tokio::test]
async fn version_level_package_needs_a_version() {
  let s = store().await;
  let err = s
    .ingest_package(PackageInput::new("npm", "", "left-pad"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  assert_eq!(s.row_count("package_names").await.unwrap(), 0);
}

#[tokio::test]
async fn source_commit_and_tag_are_identity() {
  let s = store().await;

  let tagged = s.ingest_source(guac()).await.unwrap();
  let untagged = s
    .ingest_source(SourceInput::new("git", "github.com/guacsec", "guac"))
    .await
    .unwrap();
  let again = s.ingest_source(guac()).await.unwrap();

  assert_ne!(tagged.name_id, untagged.name_id);
  assert_eq!(tagged, again);

  let found = s
    .sources(Some(&SourceFilter { tag: Some("v0.1.0".into()), ..Default::default() }))
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].tag.as_deref(), Some("v0.1.0"));
  assert_eq!(found[0].commit, None);
}

#[tokio::test]
async fn artifacts_are_case_normalized() {
  let s = store().await;

  let upper = s.ingest_artifact(ArtifactInput::new("SHA256", "ABCD")).await.unwrap();
  let lower = s.ingest_artifact(digest("abcd")).await.unwrap();
  assert_eq!(upper, lower);

  let found = s
    .artifacts(Some(&ArtifactFilter { digest: Some("AbCd".into()), ..Default::default() }))
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].algorithm, "sha256");
}

#[tokio::test]
async fn package_query_filters_on_qualifiers() {
  let s = store().await;
  s.ingest_package(curl()).await.unwrap();
  s.ingest_package(left_pad("1.0.0")).await.unwrap();

  let amd64 = s
    .packages(Some(&PackageFilter {
      qualifiers: vec![QualifierFilter { key: "arch".into(), value: Some("amd64".into()) }],
      ..Default::default()
    }))
    .await
    .unwrap();
  assert_eq!(amd64.len(), 1);
  assert_eq!(amd64[0].name, "curl");
  assert_eq!(amd64[0].purl(), "pkg:deb/debian/curl@7.88.1?arch=amd64&distro=bookworm");

  let bare = s
    .packages(Some(&PackageFilter { match_only_empty_qualifiers: true, ..Default::default() }))
    .await
    .unwrap();
  assert_eq!(bare.len(), 1);
  assert_eq!(bare[0].name, "left-pad");

  assert_eq!(s.packages(None).await.unwrap().len(), 2);
}

// ─── Occurrence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn occurrence_is_idempotent() {
  let s = store().await;
  s.ingest_artifact(digest("aa")).await.unwrap();

  let first = s
    .ingest_occurrence(PackageOrSourceInput::package(curl()), digest("aa").into(), scan())
    .await
    .unwrap();
  let second = s
    .ingest_occurrence(PackageOrSourceInput::package(curl()), digest("aa").into(), scan())
    .await
    .unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(s.row_count("occurrences").await.unwrap(), 1);
}

#[tokio::test]
async fn occurrence_with_both_or_neither_subject_is_rejected() {
  let s = store().await;
  s.ingest_artifact(digest("aa")).await.unwrap();

  let both = PackageOrSourceInput {
    package: Some(curl().into()),
    source:  Some(guac().into()),
  };
  let err = s.ingest_occurrence(both, digest("aa").into(), scan()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);

  let err = s
    .ingest_occurrence(PackageOrSourceInput::default(), digest("aa").into(), scan())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);

  assert_eq!(s.row_count("occurrences").await.unwrap(), 0);
  assert_eq!(s.row_count("package_versions").await.unwrap(), 0);
}

#[tokio::test]
async fn package_and_source_subjects_do_not_collide() {
  let s = store().await;
  s.ingest_artifact(digest("aa")).await.unwrap();

  let as_package = s
    .ingest_occurrence(PackageOrSourceInput::package(curl()), digest("aa").into(), scan())
    .await
    .unwrap();
  let as_source = s
    .ingest_occurrence(PackageOrSourceInput::source(guac()), digest("aa").into(), scan())
    .await
    .unwrap();

  assert_ne!(as_package.id, as_source.id);
  assert_eq!(s.row_count("occurrences").await.unwrap(), 2);
  assert!(matches!(as_source.subject, PackageOrSource::Source(ref n) if n.name == "guac"));
}

#[tokio::test]
async fn occurrence_requires_an_existing_artifact() {
  let s = store().await;

  let err = s
    .ingest_occurrence(PackageOrSourceInput::package(curl()), digest("ff").into(), scan())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(err.to_string().contains("sha256:ff"));

  // The failed transaction also rolled back the package path.
  assert_eq!(s.row_count("package_versions").await.unwrap(), 0);
  assert_eq!(s.row_count("occurrences").await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
  let s = store().await;
  let artifact = s.ingest_artifact(digest("aa")).await.unwrap();

  let err = s
    .ingest_occurrence(PackageOrSourceInput::package(IdOr::Id(Id(404))), IdOr::Id(artifact), scan())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn occurrence_query_hydrates_the_subject_tree() {
  let s = store().await;
  s.ingest_artifact(digest("aa")).await.unwrap();
  s.ingest_artifact(digest("bb")).await.unwrap();
  s.ingest_occurrence(PackageOrSourceInput::package(curl()), digest("aa").into(), scan())
    .await
    .unwrap();
  s.ingest_occurrence(PackageOrSourceInput::source(guac()), digest("bb").into(), scan())
    .await
    .unwrap();

  let filter = OccurrenceFilter {
    subject: Some(PackageOrSource::Package(PackageFilter {
      namespace: Some("debian".into()),
      ..PackageFilter::named("curl")
    })),
    ..Default::default()
  };
  let found = s.occurrences(Some(&filter)).await.unwrap();

  assert_eq!(found.len(), 1);
  let PackageOrSource::Package(node) = &found[0].subject else {
    panic!("expected a package subject");
  };
  assert_eq!(node.package_type, "deb");
  assert_eq!(node.namespace, "debian");
  assert_eq!(node.name, "curl");
  assert_eq!(node.version.as_ref().map(|v| v.version.as_str()), Some("7.88.1"));
  assert_eq!(found[0].artifact.digest, "aa");
  assert_eq!(found[0].justification, "found in image");

  assert_eq!(s.occurrences(None).await.unwrap().len(), 2);
}

// ─── Dependency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn dependency_is_idempotent_and_first_writer_wins() {
  let s = store().await;

  let first = s
    .ingest_dependency(
      curl().into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct().with_range("^1.0.0"),
    )
    .await
    .unwrap();
  let again = s
    .ingest_dependency(
      curl().into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct().with_range("^1.0.0"),
    )
    .await
    .unwrap();

  assert_eq!(first.id, again.id);
  assert_eq!(s.row_count("dependencies").await.unwrap(), 1);
  assert_eq!(first.dependency_type, DependencyType::Direct);
  assert_eq!(first.version_range, "^1.0.0");
}

#[tokio::test]
async fn dependent_name_and_version_are_separate_facts() {
  let s = store().await;

  let any = s
    .ingest_dependency(
      curl().into(),
      PackageInput::new("npm", "", "left-pad").into(),
      DependentMatch::AllVersions,
      direct(),
    )
    .await
    .unwrap();
  let pinned = s
    .ingest_dependency(
      curl().into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct(),
    )
    .await
    .unwrap();

  assert_ne!(any.id, pinned.id);
  assert!(any.dependent.version.is_none());
  assert!(pinned.dependent.version.is_some());
  assert_eq!(any.dependent.name_id, pinned.dependent.name_id);

  // Without a version the dependent filter matches both arms.
  let by_name = s
    .dependencies(Some(&DependencyFilter {
      dependency_package: Some(PackageFilter::named("left-pad")),
      ..Default::default()
    }))
    .await
    .unwrap();
  assert_eq!(by_name.len(), 2);

  let by_version = s
    .dependencies(Some(&DependencyFilter {
      dependency_package: Some(PackageFilter {
        version: Some("1.0.0".into()),
        ..PackageFilter::named("left-pad")
      }),
      ..Default::default()
    }))
    .await
    .unwrap();
  assert_eq!(by_version.len(), 1);
  assert_eq!(by_version[0].id, pinned.id);
}

#[tokio::test]
async fn batch_results_follow_input_order() {
  let s = store().await;

  let packages: Vec<IdOr<PackageInput>> = vec![curl().into(), curl().into(), curl().into()];
  let dependents: Vec<IdOr<PackageInput>> = vec![
    left_pad("1.0.0").into(),
    // Resolving this one creates a whole new namespace and type.
    PackageInput::new("pypi", "", "requests").with_version("2.31.0").into(),
    left_pad("1.3.0").into(),
  ];
  let ids = s
    .ingest_dependencies(
      packages,
      dependents.clone(),
      DependentMatch::SpecificVersion,
      vec![direct(), direct(), direct()],
    )
    .await
    .unwrap();

  assert_eq!(ids.len(), 3);
  for (id, dependent) in ids.iter().zip(dependents) {
    let single = s
      .ingest_dependency(curl().into(), dependent, DependentMatch::SpecificVersion, direct())
      .await
      .unwrap();
    assert_eq!(*id, single.id);
  }
}

#[tokio::test]
async fn invalid_batch_item_fails_the_whole_batch() {
  let s = store().await;

  let err = s
    .ingest_dependencies(
      vec![curl().into(), curl().into(), curl().into()],
      vec![
        left_pad("1.0.0").into(),
        PackageInput::new("npm", "", "left-pad").into(),
        left_pad("1.3.0").into(),
      ],
      DependentMatch::SpecificVersion,
      vec![direct(), direct(), direct()],
    )
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  assert_eq!(s.row_count("dependencies").await.unwrap(), 0);
}

#[tokio::test]
async fn batch_item_failing_in_the_store_fails_the_batch() {
  let s = store().await;
  s.ingest_artifact(digest("aa")).await.unwrap();

  // Every item validates; the second names an artifact nobody ingested.
  let err = s
    .ingest_occurrences(
      vec![
        PackageOrSourceInput::package(curl()),
        PackageOrSourceInput::package(curl()),
        PackageOrSourceInput::source(guac()),
      ],
      vec![digest("aa").into(), digest("zz").into(), digest("aa").into()],
      vec![scan(), scan(), scan()],
    )
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert_eq!(err.to_string(), "ingest_occurrences: artifact not found: sha256:zz");
}

#[tokio::test]
async fn mismatched_batch_lengths_are_rejected() {
  let s = store().await;
  let err = s
    .ingest_occurrences(
      vec![PackageOrSourceInput::package(curl())],
      vec![],
      vec![scan()],
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn dependents_are_ranked_by_frequency() {
  let s = store().await;
  let wget = PackageInput::new("deb", "debian", "wget").with_version("1.21");

  for depender in [curl(), wget.clone()] {
    s.ingest_dependency(
      depender.into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct(),
    )
    .await
    .unwrap();
  }
  s.ingest_dependency(
    curl().into(),
    PackageInput::new("npm", "", "is-odd").into(),
    DependentMatch::AllVersions,
    direct(),
  )
  .await
  .unwrap();

  let ranked = s.dependent_frequency(10).await.unwrap();
  assert_eq!(ranked.len(), 2);
  assert_eq!(ranked[0].package.name, "left-pad");
  assert_eq!(ranked[0].count, 2);
  assert_eq!(ranked[1].package.name, "is-odd");
  assert_eq!(ranked[1].count, 1);
}

#[tokio::test]
async fn frequency_ties_are_cut_by_purl() {
  let s = store().await;

  // zlib is ingested first and so gets the lower name id.
  for dependency in ["zlib", "acorn"] {
    s.ingest_dependency(
      curl().into(),
      PackageInput::new("npm", "", dependency).into(),
      DependentMatch::AllVersions,
      direct(),
    )
    .await
    .unwrap();
  }

  let ranked = s.dependent_frequency(1).await.unwrap();
  assert_eq!(ranked.len(), 1);
  assert_eq!(ranked[0].package.purl(), "pkg:npm/acorn");
}

// ─── SBOM ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sbom_with_missing_included_dependency_is_not_found() {
  let s = store().await;

  let err = s
    .ingest_sbom(
      PackageOrArtifactInput::package(curl()),
      sbom_doc("https://sbom.example/curl"),
      SbomIncludes { dependencies: vec![Id(999)], ..Default::default() },
    )
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(err.to_string().contains("included dependency not found: 999"));
  assert_eq!(s.row_count("sboms").await.unwrap(), 0);
}

#[tokio::test]
async fn sbom_hydrates_every_included_set() {
  let s = store().await;
  let artifact = s.ingest_artifact(digest("aa")).await.unwrap();
  let package = s.ingest_package(left_pad("1.0.0")).await.unwrap();
  let dependency = s
    .ingest_dependency(
      curl().into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct(),
    )
    .await
    .unwrap();
  let occurrence = s
    .ingest_occurrence(PackageOrSourceInput::package(curl()), IdOr::Id(artifact), scan())
    .await
    .unwrap();

  let sbom = s
    .ingest_sbom(
      PackageOrArtifactInput::artifact(IdOr::Id(artifact)),
      sbom_doc("https://sbom.example/image"),
      SbomIncludes {
        packages:     vec![package.version_id, package.version_id],
        artifacts:    vec![artifact],
        dependencies: vec![dependency.id],
        occurrences:  vec![occurrence.id],
      },
    )
    .await
    .unwrap();

  assert!(matches!(sbom.subject, PackageOrArtifact::Artifact(ref a) if a.id == artifact));
  assert_eq!(sbom.included_packages.len(), 1);
  assert_eq!(sbom.included_artifacts.len(), 1);
  assert_eq!(sbom.included_dependencies.len(), 1);
  assert_eq!(sbom.included_dependencies[0].package.name, "curl");
  assert_eq!(sbom.included_dependencies[0].dependent.name, "left-pad");
  assert_eq!(sbom.included_occurrences.len(), 1);
  assert_eq!(sbom.included_occurrences[0].artifact.id, artifact);
}

#[tokio::test]
async fn sbom_is_immutable_after_creation() {
  let s = store().await;
  let artifact = s.ingest_artifact(digest("aa")).await.unwrap();
  let other = s.ingest_artifact(digest("bb")).await.unwrap();

  let first = s
    .ingest_sbom(
      PackageOrArtifactInput::package(curl()),
      sbom_doc("https://sbom.example/curl"),
      SbomIncludes { artifacts: vec![artifact], ..Default::default() },
    )
    .await
    .unwrap();
  let second = s
    .ingest_sbom(
      PackageOrArtifactInput::package(curl()),
      sbom_doc("https://sbom.example/curl"),
      SbomIncludes { artifacts: vec![other], ..Default::default() },
    )
    .await
    .unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(s.row_count("sboms").await.unwrap(), 1);
  assert_eq!(second.included_artifacts.len(), 1);
  assert_eq!(second.included_artifacts[0].id, artifact);
}

#[tokio::test]
async fn sbom_query_matches_digest_in_any_case() {
  let s = store().await;
  let mut doc = sbom_doc("https://sbom.example/curl");
  doc.algorithm = "SHA256".into();
  doc.digest = "ABCD".into();
  let sbom = s
    .ingest_sbom(PackageOrArtifactInput::package(curl()), doc, SbomIncludes::default())
    .await
    .unwrap();
  assert_eq!(sbom.algorithm, "sha256");

  let filter = SbomFilter {
    algorithm: Some("SHA256".into()),
    digest: Some("ABCD".into()),
    ..Default::default()
  };
  let found = s.sboms(Some(&filter)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].id, sbom.id);
}

#[tokio::test]
async fn sbom_query_traverses_included_dependencies() {
  let s = store().await;
  let dependency = s
    .ingest_dependency(
      curl().into(),
      left_pad("1.0.0").into(),
      DependentMatch::SpecificVersion,
      direct(),
    )
    .await
    .unwrap();
  s.ingest_sbom(
    PackageOrArtifactInput::package(curl()),
    sbom_doc("https://sbom.example/with-deps"),
    SbomIncludes { dependencies: vec![dependency.id], ..Default::default() },
  )
  .await
  .unwrap();
  s.ingest_sbom(
    PackageOrArtifactInput::package(curl()),
    sbom_doc("https://sbom.example/empty"),
    SbomIncludes::default(),
  )
  .await
  .unwrap();

  let filter = SbomFilter {
    included_dependencies: vec![DependencyFilter {
      dependency_package: Some(PackageFilter::named("left-pad")),
      ..Default::default()
    }],
    ..Default::default()
  };
  let found = s.sboms(Some(&filter)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].uri, "https://sbom.example/with-deps");
  assert_eq!(s.sboms(None).await.unwrap().len(), 2);
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_store_fails_promptly() {
  let token = CancellationToken::new();
  let s = store().await.with_cancellation(token.clone());
  token.cancel();

  let err = s.ingest_package(curl()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unavailable);

  let err = s
    .ingest_packages(vec![curl(), left_pad("1.0.0")])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unavailable);
}
