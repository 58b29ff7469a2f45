use anyhow::{Context, bail};
use model::{Environment, Service};
use transport::Session;

use crate::command_builder::BuildContext;

/// Container name for replica `index` (1-based) of `qualified_name`,
/// matching the `_N` suffix `lib/observer::single_host` parses back off.
fn replica_name(qualified_name: &str, index: u32) -> String {
  format!("{qualified_name}_{index}")
}

fn run_command(
  ctx: &BuildContext,
  service: &Service,
  environment: &Environment,
  image_ref: &str,
  index: u32,
) -> String {
  let name = replica_name(&ctx.qualified_name, index);
  let mut cmd = format!(
    "docker run -d --name {} --network {} --restart {}",
    command::quote(&name),
    command::quote(&model::overlay_network_name(ctx.project, &environment.name)),
    match service.restart_policy {
      model::RestartPolicy::Any => "unless-stopped",
      model::RestartPolicy::OnFailure => "on-failure",
      model::RestartPolicy::None => "no",
    }
  );
  cmd.push_str(&format!(" --env-file {}", command::quote(&ctx.env_file_path.display().to_string())));

  for mount in &service.volume_mounts {
    let source = if mount.bind {
      mount.source.clone()
    } else {
      environment
        .volumes
        .get(&mount.source)
        .map(|v| v.qualified_name(ctx.project, &environment.name))
        .unwrap_or_else(|| mount.source.clone())
    };
    let ro = if mount.read_only { ":ro" } else { "" };
    cmd.push_str(&format!(" -v {}:{}{ro}", command::quote(&source), command::quote(&mount.target)));
  }

  if service.port != 0 {
    cmd.push_str(&format!(" -p {}:{}", service.port, service.port));
  }

  cmd.push_str(&format!(" {}", command::quote(image_ref)));
  if let Some(command_override) = &service.command {
    cmd.push_str(&format!(" {command_override}"));
  }
  cmd
}

/// Removes every existing replica container for this service (by
/// listing containers under its qualified-name prefix) and starts
/// `replicas` fresh ones. Single-host mode has no rolling-update
/// primitive, so both create and update converge through this one path.
pub async fn replace_group(
  session: &Session,
  ctx: &BuildContext,
  service: &Service,
  environment: &Environment,
  image_ref: &str,
) -> anyhow::Result<()> {
  remove_group(session, &ctx.qualified_name).await?;

  let replicas = service.normalized_replicas();
  for index in 1..=replicas {
    let cmd = run_command(ctx, service, environment, image_ref, index);
    let out = session
      .execute(&cmd)
      .await
      .with_context(|| format!("failed to start container for '{}'", service.name))?;
    if !out.success {
      bail!("docker run failed for '{}': {}", service.name, out.stderr.trim());
    }
  }
  Ok(())
}

pub async fn remove_group(session: &Session, qualified_name: &str) -> anyhow::Result<()> {
  let list = session
    .execute(&format!(
      "docker ps -aq --filter name={}",
      command::quote(&format!("{qualified_name}_"))
    ))
    .await
    .context("failed to list existing containers")?;

  let ids: Vec<&str> = list.stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
  if ids.is_empty() {
    return Ok(());
  }
  let out = session
    .execute(&format!("docker rm -f {}", command::quote_args(ids)))
    .await
    .context("failed to remove existing containers")?;
  if !out.success {
    bail!("docker rm failed: {}", out.stderr.trim());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replica_name_appends_index() {
    assert_eq!(replica_name("acme_prod_web", 2), "acme_prod_web_2");
  }
}
