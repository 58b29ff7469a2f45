//! Shared data model for the tako orchestrator core.
//!
//! Every type here is plain data: serde-derived, cheap to clone, and free
//! of any I/O. The components in `lib/planner`, `lib/executor`, etc. all
//! build on top of these definitions rather than defining their own.

pub mod cluster_state;
pub mod config;
pub mod deployment;
pub mod environment;
pub mod error;
pub mod lock_info;
pub mod observed;
pub mod plan;
pub mod project;
pub mod resource;
pub mod server;
pub mod service;
pub mod volume;

pub use cluster_state::*;
pub use config::*;
pub use deployment::*;
pub use environment::*;
pub use error::*;
pub use lock_info::*;
pub use observed::*;
pub use plan::*;
pub use project::*;
pub use resource::*;
pub use server::*;
pub use service::*;
pub use volume::*;

/// Current unix timestamp in milliseconds, the same granularity Komodo's
/// `komodo_timestamp()` uses for `Log` and `Update` records.
pub fn tako_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// `{project}_{environment}_{service}` — the name the service is deployed
/// under on the cluster.
pub fn qualified_service_name(
  project: &str,
  environment: &str,
  service: &str,
) -> String {
  format!("{project}_{environment}_{service}")
}

/// `{project}_{environment}` — the namespace the overlay network and the
/// managed volumes share.
pub fn qualified_namespace(project: &str, environment: &str) -> String {
  format!("{project}_{environment}")
}

/// `tako_{project}_{environment}` — the overlay/bridge network name.
pub fn overlay_network_name(project: &str, environment: &str) -> String {
  format!("tako_{project}_{environment}")
}

/// `urn:{tenant}:{project}:{env}:{type}:{name}`
pub fn resource_urn(
  tenant: &str,
  project: &str,
  env: &str,
  ty: ResourceType,
  name: &str,
) -> String {
  format!("urn:{tenant}:{project}:{env}:{}:{name}", ty.as_str())
}
