use anyhow::bail;
use transport::Session;

/// A network already existing is not an error — every caller here is
/// idempotent reconciliation, not first-time provisioning.
fn already_exists(stderr: &str) -> bool {
  stderr.contains("already exists")
}

/// Ensures an attachable network named `tako_{project}_{environment}`
/// exists on `session`: `overlay` when clustered, `bridge` for the
/// single-host case (§4.5 Network).
pub async fn ensure_network(
  session: &Session,
  project: &str,
  environment: &str,
  single_host: bool,
) -> anyhow::Result<()> {
  let name = model::overlay_network_name(project, environment);
  let driver = if single_host { "bridge" } else { "overlay" };

  let out = session
    .execute(&format!(
      "docker network create --driver {driver} --attachable \
       --label project={} --label environment={} {}",
      command::quote(project),
      command::quote(environment),
      command::quote(&name)
    ))
    .await?;
  if !out.success && !already_exists(&out.stderr) {
    bail!("failed to create network '{name}': {}", out.stderr.trim());
  }
  Ok(())
}

/// Removes the project/environment overlay network, ignoring "not found"
/// (used by the single-host downgrade path).
pub async fn remove_network(
  session: &Session,
  project: &str,
  environment: &str,
) -> anyhow::Result<()> {
  let name = model::overlay_network_name(project, environment);
  let out = session.execute(&format!("docker network rm {}", command::quote(&name))).await?;
  if !out.success && !out.stderr.contains("not found") {
    bail!("failed to remove network '{name}': {}", out.stderr.trim());
  }
  Ok(())
}

/// Lists every `tako_*` network present on `session`, the set the
/// reverse-proxy sidecar attaches to.
pub async fn list_tako_networks(session: &Session) -> anyhow::Result<Vec<String>> {
  let out = session
    .execute("docker network ls --format '{{.Name}}' --filter name=tako_")
    .await?;
  if !out.success {
    anyhow::bail!("failed to list networks: {}", out.stderr.trim());
  }
  Ok(
    out
      .stdout
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_already_exists_errors() {
    assert!(already_exists("Error: network with name x already exists"));
    assert!(!already_exists("Error: no such network"));
  }
}
