use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named volume. Either managed (namespaced as
/// `{project}_{env}_{key}`) or `external`, in which case it must already
/// exist on every node that mounts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedVolume {
  /// The config key this volume was declared under.
  #[serde(skip)]
  pub key: String,
  #[serde(default)]
  pub driver: Option<String>,
  #[serde(default)]
  pub driver_opts: BTreeMap<String, String>,
  #[serde(default)]
  pub labels: BTreeMap<String, String>,
  #[serde(default)]
  pub external: bool,
  /// Overrides the namespaced name when set, used for volumes that must
  /// match a pre-existing name (commonly paired with `external`).
  #[serde(default)]
  pub explicit_name: Option<String>,
}

impl NamedVolume {
  /// The name used on the cluster: `explicit_name` if set, otherwise the
  /// namespaced `{project}_{env}_{key}` form.
  pub fn qualified_name(&self, project: &str, env: &str) -> String {
    self
      .explicit_name
      .clone()
      .unwrap_or_else(|| format!("{project}_{env}_{}", self.key))
  }
}

/// A single volume mount on a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
  /// Key into the environment's `volumes` map, or a host path when
  /// `bind` is true.
  pub source: String,
  pub target: String,
  #[serde(default)]
  pub read_only: bool,
  #[serde(default)]
  pub bind: bool,
}

impl VolumeMount {
  pub fn mount_type(&self) -> &'static str {
    if self.bind { "bind" } else { "volume" }
  }
}
