use std::collections::HashMap;

use anyhow::{Context, bail};
use indexmap::IndexMap;
use model::ObservedService;
use transport::Session;

use crate::docker_json::{self, PsEntry};

struct Group {
  image: String,
  container_ids: Vec<String>,
}

/// Lists running containers namespaced under `{project}_{environment}_`
/// and reconstructs per-service replica groups from the trailing `_N`
/// token on each container name — there is no swarm descriptor to read a
/// replica count from, so `desired_replicas` is simply however many
/// containers are currently running.
pub async fn observe(
  session: &Session,
  project: &str,
  environment: &str,
) -> anyhow::Result<IndexMap<String, ObservedService>> {
  let prefix = format!("{}_", model::qualified_namespace(project, environment));

  let out = session
    .execute(&format!(
      "docker ps --filter name={} --format '{{{{json .}}}}'",
      command::quote(&prefix)
    ))
    .await
    .context("failed to list containers")?;
  if !out.success {
    bail!("docker ps failed: {}", out.stderr.trim());
  }

  let entries: Vec<PsEntry> = docker_json::parse_ndjson(&out.stdout)?;
  let mut groups: HashMap<String, Group> = HashMap::new();

  for entry in entries {
    let Some(name) = entry.names.split(',').next() else { continue };
    let Some(suffixed) = name.strip_prefix(&prefix) else { continue };
    let Ok(local_name) = docker_json::strip_replica_suffix(suffixed) else {
      continue;
    };
    let group = groups.entry(local_name.to_string()).or_insert_with(|| Group {
      image: entry.image.clone(),
      container_ids: Vec::new(),
    });
    group.container_ids.push(entry.id);
  }

  let mut observed = IndexMap::new();
  for (name, group) in groups {
    let running = group.container_ids.len() as u32;
    observed.insert(
      name.clone(),
      ObservedService {
        name,
        image_reference: group.image,
        desired_replicas: running,
        running_replicas: running,
        container_ids: group.container_ids,
        config_snapshot: None,
      },
    );
  }
  Ok(observed)
}
