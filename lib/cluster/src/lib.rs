//! Cluster lifecycle: bootstrap, worker join, overlay networking, and the
//! reverse-proxy sidecar (§4.5).
//!
//! Every operation here drives a remote `docker` CLI over the shared
//! [`transport::SessionPool`] — there is no swarm client library involved,
//! the cluster manager's entire vocabulary is shell commands and their
//! exit codes.

mod bootstrap;
mod downgrade;
mod host_state;
mod network;
mod proxy;

pub use bootstrap::bootstrap;
pub use downgrade::{
  backup_proxy_state, downgrade_to_single_host, leave_cluster,
  redeploy_proxy_as_container, remove_overlay_networks, remove_project_services,
};
pub use host_state::{HostState, inspect, local_node_id};
pub use network::{ensure_network, list_tako_networks, remove_network};
pub use proxy::{PROXY_SERVICE_NAME, ensure_sidecar, labels_for_service};

use model::{ClusterState, Environment};
use transport::SessionPool;

/// Brings `environment`'s cluster to the desired topology: bootstraps
/// swarm membership if it isn't already clustered, ensures the overlay
/// network exists on the manager, and makes sure the reverse-proxy
/// sidecar is running. Returns the `ClusterState` to persist.
///
/// Single-host environments skip swarm bootstrap entirely — a lone server
/// only needs its network and proxy container, handled by
/// [`downgrade::redeploy_proxy_as_container`] and [`network::ensure_network`]
/// from the caller once it observes `is_single_host()`.
pub async fn ensure_cluster(
  environment: &Environment,
  project: &str,
  pool: &SessionPool,
) -> anyhow::Result<ClusterState> {
  let state = bootstrap::bootstrap(environment, pool).await?;

  let manager = environment
    .designated_manager()
    .ok_or_else(|| anyhow::anyhow!("no manager host in environment"))?;
  let manager_session = pool.get(manager).await?;

  network::ensure_network(&manager_session, project, &environment.name, false).await?;

  let acme_dir = format!("/var/lib/tako/{project}/acme");
  let log_dir = format!("/var/lib/tako/{project}/proxy-logs");
  proxy::ensure_sidecar(&manager_session, &acme_dir, &log_dir).await?;

  Ok(state)
}
