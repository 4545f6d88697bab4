//! Error types for `provgraph-core`.
//!
//! Backends have their own error enums; [`ErrorKind`] and [`Classify`] let
//! higher layers (the HTTP API) treat them uniformly without downcasting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or contradictory input, rejected before touching the store.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// A referenced entity does not exist.
  #[error("{entity} not found: {reference}")]
  NotFound {
    entity:    &'static str,
    reference: String,
  },

  #[error("invalid package url {purl:?}: {reason}")]
  InvalidPurl { purl: String, reason: String },

  #[error("operation cancelled")]
  Cancelled,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::InvalidArgument(message.into())
  }

  pub fn not_found(entity: &'static str, reference: impl ToString) -> Self {
    Self::NotFound { entity, reference: reference.to_string() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error taxonomy shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad input; never retried.
  InvalidArgument,
  /// A referenced entity is missing.
  NotFound,
  /// Unexpected store or constraint failure.
  Internal,
  /// The store is unreachable, or the operation was cancelled.
  Unavailable,
}

/// Implemented by every error type that crosses a crate boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidArgument(_) | Error::InvalidPurl { .. } => {
        ErrorKind::InvalidArgument
      }
      Error::NotFound { .. } => ErrorKind::NotFound,
      Error::Cancelled => ErrorKind::Unavailable,
      Error::Serialization(_) => ErrorKind::Internal,
    }
  }
}
