use serde::{Deserialize, Serialize};

use crate::service::Service;

/// A service as observed at a point in time on the cluster (§3 Observed
/// Service). Produced by `lib/observer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedService {
  pub name: String,
  pub image_reference: String,
  pub desired_replicas: u32,
  pub running_replicas: u32,
  pub container_ids: Vec<String>,
  /// The last desired config this orchestrator recorded for this
  /// service, when the state store has one. `None` means any observed
  /// difference is attributed generically rather than to a specific
  /// field (§3 invariant).
  pub config_snapshot: Option<Service>,
}

impl ObservedService {
  pub fn is_persistent(&self) -> bool {
    self
      .config_snapshot
      .as_ref()
      .is_some_and(|s| s.persistent)
  }
}
