use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
  Success,
  Failed,
  Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
  Parallel,
  Sequential,
}

/// Per-service outcome recorded inside a [`DeploymentRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeploymentOutcome {
  pub service: String,
  pub image: String,
  pub success: bool,
  pub message: Option<String>,
}

/// An immutable record of one `deploy` invocation. Written by
/// `lib/state`, never mutated once persisted (§3 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
  pub deployment_id: String,
  pub timestamp: i64,
  pub environment: String,
  pub mode: DeploymentMode,
  pub status: DeploymentStatus,
  pub duration_ms: u64,
  pub services: Vec<ServiceDeploymentOutcome>,
  pub network_info: Option<String>,
  pub volume_info: Vec<String>,
  pub config_hash: String,
  pub is_rollback_point: bool,
  pub git_commit: Option<String>,
  pub triggered_by: String,
}

impl DeploymentRecord {
  pub fn history_key(&self) -> String {
    // Second-granularity ISO-8601, matching the `history/<iso>.json`
    // filename convention in spec §6.
    chrono::DateTime::from_timestamp_millis(self.timestamp)
      .unwrap_or_else(chrono::Utc::now)
      .format("%Y-%m-%dT%H:%M:%SZ")
      .to_string()
  }
}
