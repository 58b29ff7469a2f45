use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted (and, on disk, encrypted — see `lib/state::swarm`) cluster
/// membership record. Carries the cluster-join tokens, so it is never
/// written in plaintext outside of process memory.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
  pub initialized: bool,
  pub manager_host: Option<String>,
  pub worker_token: Option<String>,
  pub manager_token: Option<String>,
  pub node_id_by_hostname: BTreeMap<String, String>,
  pub registry_host: Option<String>,
  pub registry_port: Option<u16>,
  pub last_updated: i64,
}
