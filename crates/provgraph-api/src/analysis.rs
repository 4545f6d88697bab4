//! Health, dependency query and dependency analysis endpoints.
//!
//! Both dependency endpoints answer with a JSON array of package URLs.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use provgraph_core::{
  dependency::DependencyFilter,
  package::PackageFilter,
  purl,
  store::{GraphStore, MAX_PAGE_SIZE},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;

/// `GET /healthz`
pub async fn healthz() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[derive(Debug, Deserialize)]
pub struct DependencyQueryParams {
  pub purl: Option<String>,
}

/// `GET /query/dependencies?purl=<purl>`
///
/// Purls of every package the given package depends on, sorted and
/// de-duplicated. A purl without a version matches every stored version.
pub async fn query_dependencies<S: GraphStore>(
  State(store): State<Arc<S>>,
  params: Result<Query<DependencyQueryParams>, QueryRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
  let Query(params) = params?;
  let raw = params
    .purl
    .filter(|p| !p.is_empty())
    .ok_or_else(|| ApiError::BadRequest("missing purl parameter".into()))?;
  let package = purl::parse(&raw)?;

  let filter = DependencyFilter {
    package: Some(PackageFilter::from_input(&package)),
    ..Default::default()
  };
  let found = store
    .dependencies(Some(&filter))
    .await
    .map_err(ApiError::store)?;

  let mut purls: Vec<String> = found.iter().map(|d| d.dependent.purl()).collect();
  purls.sort();
  purls.dedup();
  Ok(Json(purls))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisParams {
  pub sort:  Option<String>,
  pub limit: Option<usize>,
}

/// `GET /analysis/dependencies?sort=frequency[&limit=n]`
///
/// Dependent packages ranked by how many dependency facts point at them,
/// most depended-on first; ties are ordered by purl. `sort=scorecard` is
/// not supported by this store.
pub async fn analyze_dependencies<S: GraphStore>(
  State(store): State<Arc<S>>,
  params: Result<Query<AnalysisParams>, QueryRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
  let Query(params) = params?;
  match params.sort.as_deref() {
    Some("frequency") => {}
    Some("scorecard") => {
      return Err(ApiError::BadRequest(
        "sort=scorecard is not supported: this store holds no scorecards".into(),
      ));
    }
    Some(other) => {
      return Err(ApiError::BadRequest(format!(
        "unknown sort {other:?}, expected \"frequency\" or \"scorecard\""
      )));
    }
    None => return Err(ApiError::BadRequest("missing sort parameter".into())),
  }

  let limit = params.limit.unwrap_or(MAX_PAGE_SIZE);
  let ranked = store
    .dependent_frequency(limit)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|d| d.package.purl())
    .collect();

  Ok(Json(ranked))
}
