use serde::{Deserialize, Serialize};

/// Identifies the orchestrator tenant on a cluster. Every qualified name
/// on the cluster (`{project}_{environment}_{service}`) is namespaced
/// under this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub name: String,
  pub version: String,
}

impl Project {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }
}
