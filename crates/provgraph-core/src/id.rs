//! Store-assigned node identifiers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// An opaque, stable identifier for a node or relation row.
///
/// Identifiers are assigned by the store and are only meaningful within the
/// table they were issued from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub i64);

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl FromStr for Id {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.parse()
      .map(Id)
      .map_err(|_| Error::invalid(format!("malformed node id: {s:?}")))
  }
}

impl From<i64> for Id {
  fn from(raw: i64) -> Self { Id(raw) }
}

/// A reference to an entity either by its known [`Id`] or by a full
/// descriptor to be resolved (and, for identity-tree nodes, created).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOr<T> {
  Id(Id),
  Descriptor(T),
}

impl<T> IdOr<T> {
  pub fn as_descriptor(&self) -> Option<&T> {
    match self {
      IdOr::Id(_) => None,
      IdOr::Descriptor(d) => Some(d),
    }
  }
}

impl<T> From<T> for IdOr<T> {
  fn from(descriptor: T) -> Self { IdOr::Descriptor(descriptor) }
}

/// De-duplicate and order a set of identifiers.
pub fn sort_and_dedup(ids: &[Id]) -> Vec<Id> {
  let mut out = ids.to_vec();
  out.sort_unstable();
  out.dedup();
  out
}
