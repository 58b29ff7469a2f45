use anyhow::bail;
use model::Environment;
use tracing::{info, warn};
use transport::{Session, SessionPool};

use crate::{network, proxy};

/// Tars up the ACME certificate storage and snapshots the current service
/// list before tearing anything down, so a failed downgrade can at least
/// be diagnosed (or the certs recovered) after the fact.
pub async fn backup_proxy_state(
  manager_session: &Session,
  acme_dir: &str,
  backup_dir: &str,
) -> anyhow::Result<()> {
  let out = manager_session
    .execute(&format!(
      "mkdir -p {backup} && tar -czf {backup}/acme-backup.tar.gz -C {acme} . \
       && docker service ls --format '{{{{json .}}}}' > {backup}/services-backup.jsonl",
      backup = command::quote(backup_dir),
      acme = command::quote(acme_dir),
    ))
    .await?;
  if !out.success {
    bail!("failed to back up proxy state before downgrade: {}", out.stderr.trim());
  }
  Ok(())
}

/// Removes every cluster service whose qualified name is namespaced under
/// `{project}_`, across every environment on this cluster.
pub async fn remove_project_services(
  manager_session: &Session,
  project: &str,
) -> anyhow::Result<()> {
  let list = manager_session
    .execute(&format!(
      "docker service ls --filter name={} --format '{{{{.Name}}}}'",
      command::quote(&format!("{project}_"))
    ))
    .await?;
  if !list.success {
    bail!("failed to list services for '{project}': {}", list.stderr.trim());
  }

  for name in list.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
    let out = manager_session
      .execute(&format!("docker service rm {}", command::quote(name)))
      .await?;
    if !out.success {
      bail!("failed to remove service '{name}': {}", out.stderr.trim());
    }
  }
  Ok(())
}

/// Forces the manager to leave the swarm. `--force` is required since a
/// lone manager leaving would otherwise be refused as "last manager".
pub async fn leave_cluster(manager_session: &Session) -> anyhow::Result<()> {
  let out = manager_session.execute("docker swarm leave --force").await?;
  if !out.success && !out.stderr.contains("not part of a swarm") {
    bail!("docker swarm leave failed: {}", out.stderr.trim());
  }
  Ok(())
}

/// Removes the project/environment overlay network from every server that
/// still has it, tolerating hosts that are unreachable or never had it.
pub async fn remove_overlay_networks(
  environment: &Environment,
  project: &str,
  pool: &SessionPool,
) -> anyhow::Result<()> {
  for server in &environment.member_servers {
    let session = match pool.get(server).await {
      Ok(session) => session,
      Err(e) => {
        warn!("skipping network cleanup on '{}': {e:#}", server.name);
        continue;
      }
    };
    network::remove_network(&session, project, &environment.name).await?;
  }
  Ok(())
}

/// Redeploys the reverse proxy as a plain container with the same
/// publish/mount shape the cluster-service sidecar had, for the downgraded
/// single-host topology.
pub async fn redeploy_proxy_as_container(
  session: &Session,
  acme_dir: &str,
  log_dir: &str,
) -> anyhow::Result<()> {
  let rm = session
    .execute(&format!(
      "docker rm -f {} 2>/dev/null",
      command::quote(proxy::PROXY_SERVICE_NAME)
    ))
    .await;
  if rm.is_err() {
    warn!("could not remove a pre-existing proxy container, continuing");
  }

  let out = session
    .execute(&format!(
      "docker run -d \
       --name {name} \
       --restart always \
       -v /var/run/docker.sock:/var/run/docker.sock:ro \
       -v {acme}:/acme \
       -v {logs}:/logs \
       -p 80:80 -p 443:443 \
       traefik:v3.1 \
       --providers.docker \
       --providers.docker.exposedbydefault=false \
       --entrypoints.web.address=:80 \
       --entrypoints.websecure.address=:443 \
       --certificatesresolvers.letsencrypt.acme.storage=/acme/acme.json \
       --certificatesresolvers.letsencrypt.acme.httpchallenge.entrypoint=web \
       --log.filepath=/logs/traefik.log",
      name = command::quote(proxy::PROXY_SERVICE_NAME),
      acme = command::quote(acme_dir),
      logs = command::quote(log_dir),
    ))
    .await?;
  if !out.success {
    bail!("failed to redeploy proxy as a plain container: {}", out.stderr.trim());
  }
  Ok(())
}

/// Runs the full single-host downgrade sequence (§4.5): back up, remove
/// cluster services, leave the cluster, remove overlay networks, redeploy
/// the proxy as a plain container.
pub async fn downgrade_to_single_host(
  environment: &Environment,
  project: &str,
  pool: &SessionPool,
  acme_dir: &str,
  log_dir: &str,
  backup_dir: &str,
) -> anyhow::Result<()> {
  let manager = environment
    .designated_manager()
    .ok_or_else(|| anyhow::anyhow!("no manager host to downgrade from"))?;
  let manager_session = pool.get(manager).await?;

  info!("downgrading project '{project}' to single-host topology");
  backup_proxy_state(&manager_session, acme_dir, backup_dir).await?;
  remove_project_services(&manager_session, project).await?;
  leave_cluster(&manager_session).await?;
  remove_overlay_networks(environment, project, pool).await?;
  redeploy_proxy_as_container(&manager_session, acme_dir, log_dir).await?;
  Ok(())
}
