use std::collections::BTreeMap;

use anyhow::{Context, bail};
use model::{ClusterState, Environment, Server};
use tracing::{info, warn};
use transport::SessionPool;

use crate::host_state::{self, HostState};

/// The port `docker swarm join` dials on the manager.
const SWARM_PORT: u16 = 2377;

/// A `docker swarm init`/`join` stderr that means "this host is already
/// where we wanted it to end up" rather than a real failure. Re-entrancy
/// requirement from §4.5: bootstrapping a cluster that already exists is a
/// success, not an error.
fn is_already_clustered(stderr: &str) -> bool {
  stderr.contains("already part of a swarm")
}

/// Inspects every server in `environment`, initializes the cluster on the
/// designated manager if none is clustered yet, joins every worker that
/// isn't already a member, and applies configured node labels. Returns the
/// `ClusterState` fields the caller should persist.
pub async fn bootstrap(
  environment: &Environment,
  pool: &SessionPool,
) -> anyhow::Result<ClusterState> {
  let manager = environment
    .designated_manager()
    .context("environment has no member servers to bootstrap a cluster on")?;

  let manager_session = pool.get(manager).await?;
  let manager_state = host_state::inspect(&manager_session).await?;

  if let HostState::Member { manager: false } = manager_state {
    bail!(
      "designated manager '{}' is already a swarm worker, not a manager; \
       resolve this manually before bootstrapping",
      manager.name
    );
  }

  if matches!(manager_state, HostState::NotClustered) {
    info!("initializing swarm cluster on manager '{}'", manager.name);
    let out = manager_session
      .execute(&format!(
        "docker swarm init --advertise-addr {}",
        manager.host
      ))
      .await?;
    if !out.success && !is_already_clustered(&out.stderr) {
      bail!("docker swarm init on {} failed: {}", manager.name, out.stderr.trim());
    }
  } else {
    info!("manager '{}' is already clustered", manager.name);
  }

  let worker_token = join_token(&manager_session, "worker").await?;
  let manager_token = join_token(&manager_session, "manager").await?;

  let mut node_id_by_hostname = BTreeMap::new();
  node_id_by_hostname.insert(
    manager.name.clone(),
    host_state::local_node_id(&manager_session).await?,
  );

  for server in environment.member_servers.iter() {
    if server.name == manager.name {
      continue;
    }
    join_worker(server, &manager.host, &worker_token, pool).await?;
    let session = pool.get(server).await?;
    node_id_by_hostname
      .insert(server.name.clone(), host_state::local_node_id(&session).await?);
  }

  apply_node_labels(environment, &manager_session, &node_id_by_hostname).await?;

  Ok(ClusterState {
    initialized: true,
    manager_host: Some(manager.host.clone()),
    worker_token: Some(worker_token),
    manager_token: Some(manager_token),
    node_id_by_hostname,
    registry_host: None,
    registry_port: None,
    last_updated: model::tako_timestamp(),
  })
}

async fn join_token(
  manager_session: &transport::Session,
  kind: &str,
) -> anyhow::Result<String> {
  let out = manager_session
    .execute(&format!("docker swarm join-token {kind} -q"))
    .await
    .with_context(|| format!("failed to read {kind} join token"))?;
  if !out.success {
    bail!("docker swarm join-token {kind} failed: {}", out.stderr.trim());
  }
  let token = out.stdout.trim().to_string();
  if token.is_empty() {
    bail!("docker swarm join-token {kind} returned an empty token");
  }
  Ok(token)
}

async fn join_worker(
  server: &Server,
  manager_host: &str,
  worker_token: &str,
  pool: &SessionPool,
) -> anyhow::Result<()> {
  let session = pool.get(server).await?;
  if let HostState::Member { .. } = host_state::inspect(&session).await? {
    info!("'{}' is already a cluster member", server.name);
    return Ok(());
  }

  info!("joining '{}' to the cluster", server.name);
  let out = session
    .execute(&format!(
      "docker swarm join --token {worker_token} {manager_host}:{SWARM_PORT}"
    ))
    .await?;
  if !out.success && !is_already_clustered(&out.stderr) {
    bail!("docker swarm join on {} failed: {}", server.name, out.stderr.trim());
  }
  Ok(())
}

/// Applies each server's configured labels as swarm node labels, run from
/// the manager (`docker node update` only works against the local
/// manager's view of the cluster).
async fn apply_node_labels(
  environment: &Environment,
  manager_session: &transport::Session,
  node_id_by_hostname: &BTreeMap<String, String>,
) -> anyhow::Result<()> {
  for server in &environment.member_servers {
    let Some(node_id) = node_id_by_hostname.get(&server.name) else {
      warn!("no node id recorded for '{}', skipping labels", server.name);
      continue;
    };
    for (key, value) in &server.labels {
      let out = manager_session
        .execute(&format!(
          "docker node update --label-add {}={} {}",
          command::quote(key),
          command::quote(value),
          command::quote(node_id)
        ))
        .await?;
      if !out.success {
        bail!(
          "failed to label node '{}' with {key}={value}: {}",
          server.name,
          out.stderr.trim()
        );
      }
    }
  }
  Ok(())
}
