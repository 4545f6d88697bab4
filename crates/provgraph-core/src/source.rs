//! Sources: the `type → namespace → name` identity tree for source
//! repositories. Commit and tag are part of a source name's identity.

use serde::{Deserialize, Serialize};

use crate::{Error, Id, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInput {
  #[serde(rename = "type")]
  pub source_type: String,
  pub namespace:   String,
  pub name:        String,
  #[serde(default)]
  pub commit:      Option<String>,
  #[serde(default)]
  pub tag:         Option<String>,
}

impl SourceInput {
  pub fn new(
    source_type: impl Into<String>,
    namespace: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      source_type: source_type.into(),
      namespace: namespace.into(),
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
    self.commit = Some(commit.into());
    self
  }

  pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
    self.tag = Some(tag.into());
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.source_type.is_empty() {
      return Err(Error::invalid("source type must not be empty"));
    }
    if self.name.is_empty() {
      return Err(Error::invalid("source name must not be empty"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIds {
  pub type_id:      Id,
  pub namespace_id: Id,
  pub name_id:      Id,
}

/// A source name hydrated up to its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
  pub type_id:      Id,
  #[serde(rename = "type")]
  pub source_type:  String,
  pub namespace_id: Id,
  pub namespace:    String,
  pub name_id:      Id,
  pub name:         String,
  pub commit:       Option<String>,
  pub tag:          Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFilter {
  pub id:          Option<Id>,
  #[serde(rename = "type")]
  pub source_type: Option<String>,
  pub namespace:   Option<String>,
  pub name:        Option<String>,
  pub commit:      Option<String>,
  pub tag:         Option<String>,
}
