//! End-to-end tests for the JSON router over an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use provgraph_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _;

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

async fn send(store: &Arc<SqliteStore>, method: &str, uri: &str, body: Option<Value>) -> Response {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();
  provgraph_api::router(store.clone()).oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn npm(name: &str, version: &str) -> Value {
  json!({ "descriptor": { "type": "npm", "namespace": "", "name": name, "version": version } })
}

async fn depend(store: &Arc<SqliteStore>, package: Value, dependent: Value, matching: &str) {
  let resp = send(
    store,
    "POST",
    "/api/dependencies",
    Some(json!({
      "package": package,
      "dependent": dependent,
      "matching": matching,
      "dependency": { "dependency_type": "direct", "justification": "lockfile" },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
}

// ── Health ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_reports_ok() {
  let s = store().await;
  let resp = send(&s, "GET", "/healthz", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!({ "status": "ok" }));
}

// ── Query / analysis ────────────────────────────────────────────────────────

#[tokio::test]
async fn query_dependencies_returns_sorted_purls() {
  let s = store().await;
  depend(&s, npm("express", "4.18.2"), npm("qs", "6.11.0"), "specific_version").await;
  depend(&s, npm("express", "4.18.2"), npm("body-parser", "1.20.1"), "specific_version").await;
  depend(&s, npm("koa", "2.14.0"), npm("qs", "6.11.0"), "specific_version").await;

  let resp = send(&s, "GET", "/query/dependencies?purl=pkg:npm/express@4.18.2", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(
    json_body(resp).await,
    json!(["pkg:npm/body-parser@1.20.1", "pkg:npm/qs@6.11.0"])
  );
}

#[tokio::test]
async fn query_dependencies_rejects_missing_or_bad_purl() {
  let s = store().await;

  let resp = send(&s, "GET", "/query/dependencies", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert!(body["error"].as_str().unwrap().contains("purl"), "body: {body}");

  let resp = send(&s, "GET", "/query/dependencies?purl=npm/express", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analysis_ranks_dependents_by_frequency() {
  let s = store().await;
  depend(&s, npm("express", "4.18.2"), npm("qs", "6.11.0"), "specific_version").await;
  depend(&s, npm("koa", "2.14.0"), npm("qs", "6.11.0"), "specific_version").await;
  depend(
    &s,
    npm("koa", "2.14.0"),
    json!({ "descriptor": { "type": "npm", "name": "debug" } }),
    "all_versions",
  )
  .await;

  let resp = send(&s, "GET", "/analysis/dependencies?sort=frequency", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!(["pkg:npm/qs", "pkg:npm/debug"]));
}

#[tokio::test]
async fn analysis_rejects_scorecard_and_unknown_sorts() {
  let s = store().await;
  for uri in [
    "/analysis/dependencies?sort=scorecard",
    "/analysis/dependencies?sort=popularity",
    "/analysis/dependencies",
  ] {
    let resp = send(&s, "GET", uri, None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
  }
}

// ── Identity tree ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ingested_packages_are_listed_and_queryable() {
  let s = store().await;
  let body = json!({ "type": "pypi", "name": "requests", "version": "2.31.0" });

  let first = json_body(send(&s, "POST", "/api/packages", Some(body.clone())).await).await;
  let again = json_body(send(&s, "POST", "/api/packages", Some(body)).await).await;
  assert_eq!(first, again);

  let listed = json_body(send(&s, "GET", "/api/packages", None).await).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
  assert_eq!(listed[0]["name"], "requests");

  let resp = send(&s, "POST", "/api/packages/query", Some(json!({ "name": "flask" }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!([]));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
  let s = store().await;
  let req = Request::builder()
    .method("POST")
    .uri("/api/artifacts")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{\"algorithm\": "))
    .unwrap();
  let resp = provgraph_api::router(s.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

// ── Relations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn occurrence_round_trip() {
  let s = store().await;
  let artifact = json!({ "algorithm": "sha256", "digest": "abc123" });
  let resp = send(&s, "POST", "/api/artifacts", Some(artifact.clone())).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = send(
    &s,
    "POST",
    "/api/occurrences",
    Some(json!({
      "subject": { "package": npm("express", "4.18.2") },
      "artifact": { "descriptor": artifact },
      "occurrence": { "justification": "built from", "origin": "ci", "collector": "test" },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let occurrence = json_body(resp).await;
  assert_eq!(occurrence["subject"]["package"]["name"], "express");
  assert_eq!(occurrence["artifact"]["digest"], "abc123");

  let resp = send(
    &s,
    "POST",
    "/api/occurrences/query",
    Some(json!({ "artifact": { "digest": "ABC123" } })),
  )
  .await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn occurrence_of_unknown_artifact_is_not_found() {
  let s = store().await;
  let resp = send(
    &s,
    "POST",
    "/api/occurrences",
    Some(json!({
      "subject": { "package": npm("express", "4.18.2") },
      "artifact": { "descriptor": { "algorithm": "sha256", "digest": "feed" } },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let body = json_body(resp).await;
  assert!(body["error"].as_str().unwrap().contains("sha256:feed"), "body: {body}");
}

#[tokio::test]
async fn occurrence_with_two_subjects_is_bad_request() {
  let s = store().await;
  let resp = send(
    &s,
    "POST",
    "/api/occurrences",
    Some(json!({
      "subject": {
        "package": npm("express", "4.18.2"),
        "source": { "descriptor": { "type": "git", "namespace": "github.com/expressjs", "name": "express" } },
      },
      "artifact": { "id": 1 },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_with_mismatched_lengths_is_bad_request() {
  let s = store().await;
  let resp = send(
    &s,
    "POST",
    "/api/dependencies/batch",
    Some(json!({
      "packages": [npm("express", "4.18.2"), npm("koa", "2.14.0")],
      "dependents": [npm("qs", "6.11.0")],
      "dependencies": [{}, {}],
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sbom_with_dangling_include_is_not_found() {
  let s = store().await;
  let resp = send(
    &s,
    "POST",
    "/api/sboms",
    Some(json!({
      "subject": { "package": npm("express", "4.18.2") },
      "sbom": { "uri": "https://sbom.example/express", "known_since": "2024-01-01T00:00:00Z" },
      "includes": { "dependencies": [42] },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let listed = json_body(send(&s, "GET", "/api/sboms", None).await).await;
  assert_eq!(listed, json!([]));
}

// ── Store availability ──────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_store_is_bad_gateway() {
  let token = CancellationToken::new();
  let inner = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
    .with_cancellation(token.clone());
  let s = Arc::new(inner);
  token.cancel();

  let resp = send(&s, "GET", "/query/dependencies?purl=pkg:npm/express@4.18.2", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}
