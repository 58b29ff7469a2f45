use serde::{Deserialize, Serialize};

/// Holder identity for the cross-process exclusive lock (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
  pub id: String,
  pub operation: String,
  /// `user@hostname`
  pub who: String,
  pub created_at: i64,
  pub pid: u32,
}
