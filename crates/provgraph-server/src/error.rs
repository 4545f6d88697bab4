//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("document queue closed")]
  QueueClosed,
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("document encoding failed: {0}")]
  Encode(#[from] provgraph_core::Error),
}

impl From<JsonRejection> for Error {
  fn from(rejection: JsonRejection) -> Self { Error::BadRequest(rejection.body_text()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
