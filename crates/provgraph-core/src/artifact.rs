//! Artifacts, identified by `(algorithm, digest)`.
//!
//! Both halves are lower-cased before any lookup or write.

use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInput {
  pub algorithm: String,
  pub digest:    String,
}

impl ArtifactInput {
  pub fn new(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
    Self { algorithm: algorithm.into(), digest: digest.into() }
  }

  /// Lower-case both fields and reject empty ones.
  pub fn normalized(&self) -> Result<Self> {
    if self.algorithm.is_empty() || self.digest.is_empty() {
      return Err(Error::invalid(
        "artifact algorithm and digest must not be empty",
      ));
    }
    Ok(Self {
      algorithm: self.algorithm.to_lowercase(),
      digest:    self.digest.to_lowercase(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  pub id:        Id,
  pub algorithm: String,
  pub digest:    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactFilter {
  pub id:        Option<Id>,
  pub algorithm: Option<String>,
  pub digest:    Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalization_lowercases() {
    let a = ArtifactInput::new("SHA256", "ABCDEF").normalized().unwrap();
    assert_eq!(a.algorithm, "sha256");
    assert_eq!(a.digest, "abcdef");
  }

  #[test]
  fn empty_digest_is_invalid() {
    assert!(ArtifactInput::new("sha256", "").normalized().is_err());
  }
}
