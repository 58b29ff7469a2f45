use anyhow::{Context, bail};
use indexmap::IndexMap;
use model::ObservedService;
use transport::Session;

use crate::docker_json::{self, ServiceLsEntry};

/// Lists cluster services namespaced under `{project}_{environment}_` and
/// parses each one's `r/d` replica field into running/desired.
pub async fn observe(
  session: &Session,
  project: &str,
  environment: &str,
) -> anyhow::Result<IndexMap<String, ObservedService>> {
  let prefix = format!("{}_", model::qualified_namespace(project, environment));

  let out = session
    .execute(&format!(
      "docker service ls --filter name={} --format '{{{{json .}}}}'",
      command::quote(&prefix)
    ))
    .await
    .context("failed to list cluster services")?;
  if !out.success {
    bail!("docker service ls failed: {}", out.stderr.trim());
  }

  let entries: Vec<ServiceLsEntry> = docker_json::parse_ndjson(&out.stdout)?;
  let mut observed = IndexMap::new();
  for entry in entries {
    let Some(local_name) = entry.name.strip_prefix(&prefix) else {
      continue;
    };
    let (running, desired) = docker_json::parse_replica_field(&entry.replicas)?;
    observed.insert(
      local_name.to_string(),
      ObservedService {
        name: local_name.to_string(),
        image_reference: entry.image,
        desired_replicas: desired,
        running_replicas: running,
        container_ids: Vec::new(),
        config_snapshot: None,
      },
    );
  }
  Ok(observed)
}
