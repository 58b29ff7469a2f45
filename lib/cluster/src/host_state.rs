use anyhow::Context;
use transport::Session;

/// Where a single host sits in the bootstrap state machine (§4.5): `unknown
/// → inspected → {not-clustered, member{manager|worker}}`. Only the last
/// two are ever returned by [`inspect`] — `unknown` exists purely to name
/// the pre-inspection state in the spec's state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
  NotClustered,
  Member { manager: bool },
}

/// Runs `docker info` against `session` and classifies the host's swarm
/// membership. `LocalNodeState` is `inactive` when not clustered, `active`
/// when a member; `ControlAvailable` distinguishes manager from worker.
pub async fn inspect(session: &Session) -> anyhow::Result<HostState> {
  let state = session
    .execute("docker info --format '{{.Swarm.LocalNodeState}}'")
    .await
    .with_context(|| format!("failed to inspect {}", session.host_label()))?;

  if !state.success || state.stdout.trim() != "active" {
    return Ok(HostState::NotClustered);
  }

  let control = session
    .execute("docker info --format '{{.Swarm.ControlAvailable}}'")
    .await
    .with_context(|| format!("failed to inspect {}", session.host_label()))?;

  Ok(HostState::Member { manager: control.stdout.trim() == "true" })
}

/// The node's docker-assigned ID, needed for `docker node update` label
/// calls. Must be run against a manager session.
pub async fn local_node_id(session: &Session) -> anyhow::Result<String> {
  let out = session
    .execute("docker info --format '{{.Swarm.NodeID}}'")
    .await
    .with_context(|| format!("failed to read node id on {}", session.host_label()))?;
  let id = out.stdout.trim().to_string();
  if id.is_empty() {
    anyhow::bail!("{} reported an empty swarm node id", session.host_label());
  }
  Ok(id)
}
