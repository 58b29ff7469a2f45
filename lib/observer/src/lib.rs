//! Read-only enumeration of actual cluster/container state (§4.8). Never
//! mutates anything — the planner (`lib/planner`) is the only consumer
//! allowed to turn an observation into a decision.

mod clustered;
mod docker_json;
mod single_host;

use cluster::HostState;
use indexmap::IndexMap;
use model::ObservedService;
use transport::Session;

/// Observes every service namespaced under `{project}_{environment}_` on
/// `session`'s host, dispatching to the clustered or single-host listing
/// strategy, then enriches each with the `config_snapshot` the state store
/// remembers for it, when one exists.
pub async fn observe(
  session: &Session,
  project: &str,
  environment: &str,
  store: &state::StateStore,
) -> anyhow::Result<IndexMap<String, ObservedService>> {
  let mut observed = match cluster::inspect(session).await? {
    HostState::Member { .. } => clustered::observe(session, project, environment).await?,
    HostState::NotClustered => single_host::observe(session, project, environment).await?,
  };

  for service in observed.values_mut() {
    if let Some(previous) = store.load_service_state(environment, &service.name).await? {
      service.config_snapshot = previous.config_snapshot;
    }
  }

  Ok(observed)
}
