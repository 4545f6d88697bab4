//! Error type for `provgraph-store-sqlite`.

use provgraph_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] provgraph_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row could not be decoded, or a reference it holds is
  /// dangling. Indicates a corrupt or foreign database.
  #[error("corrupt row in {table}: {reason}")]
  Corrupt { table: &'static str, reason: String },

  /// Failure inside a named store operation.
  #[error("{op}: {source}")]
  Op {
    op:     &'static str,
    #[source]
    source: Box<Error>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
    Self::Corrupt { table, reason: reason.into() }
  }

  /// The innermost error, looking through operation wrappers.
  pub fn root(&self) -> &Error {
    match self {
      Error::Op { source, .. } => source.root(),
      other => other,
    }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Op { source, .. } => source.kind(),
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => ErrorKind::Unavailable,
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) | Error::Sqlite(e) => {
        sqlite_kind(e)
      }
      Error::Database(_) => ErrorKind::Internal,
      Error::DateParse(_) | Error::Corrupt { .. } => ErrorKind::Internal,
    }
  }
}

fn sqlite_kind(e: &rusqlite::Error) -> ErrorKind {
  match e.sqlite_error_code() {
    Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
      ErrorKind::Unavailable
    }
    _ => ErrorKind::Internal,
  }
}

/// Attach the failing operation's name to an error.
pub(crate) trait OpContext<T> {
  fn op(self, op: &'static str) -> Result<T>;
}

impl<T, E: Into<Error>> OpContext<T> for std::result::Result<T, E> {
  fn op(self, op: &'static str) -> Result<T> {
    self.map_err(|e| match e.into() {
      wrapped @ Error::Op { op: inner, .. } if inner == op => wrapped,
      other => Error::Op { op, source: Box::new(other) },
    })
  }
}
