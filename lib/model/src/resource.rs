use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
  Service,
  Network,
  Volume,
  Secret,
  Config,
  Image,
}

impl ResourceType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceType::Service => "service",
      ResourceType::Network => "network",
      ResourceType::Volume => "volume",
      ResourceType::Secret => "secret",
      ResourceType::Config => "config",
      ResourceType::Image => "image",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
  Pending,
  Creating,
  Created,
  Updating,
  Deleting,
  Deleted,
  Failed,
}

/// A Pulumi-style typed record in the resource graph (§3 Resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
  pub urn: String,
  #[serde(rename = "type")]
  pub ty: ResourceType,
  pub provider: String,
  pub status: ResourceStatus,
  #[serde(default)]
  pub inputs: BTreeMap<String, Value>,
  #[serde(default)]
  pub outputs: BTreeMap<String, Value>,
  #[serde(default)]
  pub dependencies: Vec<String>,
  #[serde(default)]
  pub parent: Option<String>,
  pub inputs_hash: String,
}

impl Resource {
  /// `hash(new_inputs) != stored_hash` (§4.2 build cache predicate,
  /// reused verbatim for the resource graph).
  pub fn has_changed(&self, new_inputs: &BTreeMap<String, Value>) -> bool {
    hash_inputs(new_inputs) != self.inputs_hash
  }
}

pub fn hash_inputs(inputs: &BTreeMap<String, Value>) -> String {
  use sha2::{Digest, Sha256};
  // BTreeMap already iterates in key order, so serialization is stable.
  let bytes = serde_json::to_vec(inputs).unwrap_or_default();
  let digest = Sha256::digest(bytes);
  hex::encode(digest)
}
