//! Applies a [`model::Plan`] to a cluster (§4.11/§4.12): removes, then
//! updates, then adds, each respecting the dependency order
//! `lib/resolver` computes — and, within one service, hook validation,
//! hook execution, env-file materialization, and the
//! create-vs-update command dispatch.

mod command_builder;
mod hooks;
mod placement;
mod single_host;

use std::collections::BTreeMap;

use anyhow::Context;
use cluster::HostState;
use command_builder::BuildContext;
use model::{
  ChangeType, DeploymentMode, DeploymentRecord, DeploymentStatus, Environment,
  Resource, ResourceStatus, ResourceType, Service, ServiceDeploymentOutcome,
};
use redact::Redactor;
use sha2::{Digest, Sha256};
use state::StateStore;
use tracing::{info, warn};
use transport::SessionPool;

/// Applies `plan` to `environment`, in remove -> update -> add order
/// (dependency order within the update/add groups). A failure on one
/// service never aborts the others — every outcome is collected into the
/// returned [`DeploymentRecord`], whose `status` reflects how many
/// succeeded.
pub async fn apply(
  environment: &Environment,
  project: &str,
  project_root: &std::path::Path,
  plan: &model::Plan,
  pool: &SessionPool,
  store: &StateStore,
  redactor: &Redactor,
  triggered_by: &str,
) -> anyhow::Result<DeploymentRecord> {
  let start = std::time::Instant::now();

  if !plan.has_changes() {
    let record = build_record(project, environment, Vec::new(), start, triggered_by);
    store.deployment_history(&environment.name).record(&record).await?;
    return Ok(record);
  }

  let manager = environment
    .designated_manager()
    .context("no member server configured for this environment")?;
  let manager_session = pool.get(manager).await?;
  let clustered = matches!(cluster::inspect(&manager_session).await?, HostState::Member { .. });

  let mut outcomes = Vec::new();

  let mut removes: Vec<&model::Change> = plan.removes().collect();
  removes.sort_by(|a, b| a.service.cmp(&b.service));
  for change in removes {
    let qualified = model::qualified_service_name(project, &environment.name, &change.service);
    let result = remove_one(&manager_session, &qualified, clustered).await;
    outcomes.push(ServiceDeploymentOutcome {
      service: change.service.clone(),
      image: String::new(),
      success: result.is_ok(),
      message: result.err().map(|e| format!("{e:#}")),
    });
  }

  let order = resolver::resolve_order(&environment.services)
    .context("failed to compute deploy order")?;
  let pending: BTreeMap<&str, &model::Change> = plan
    .changes
    .iter()
    .filter(|c| matches!(c.change_type, ChangeType::Add | ChangeType::Update))
    .map(|c| (c.service.as_str(), c))
    .collect();

  // §5: "removes finish before updates start, which finish before adds
  // start" — two full dependency-ordered passes, not one interleaved one.
  for wanted in [ChangeType::Update, ChangeType::Add] {
    for name in &order {
      let Some(change) = pending.get(name.as_str()) else { continue };
      if change.change_type != wanted {
        continue;
      }
      let Some(service) = environment.services.get(name.as_str()) else { continue };

      let result = deploy_one(
        &manager_session,
        environment,
        project,
        project_root,
        service,
        change.old_config.as_ref(),
        clustered,
        redactor,
      )
      .await;

      let image_ref = service.image.image_reference().unwrap_or_default().to_string();
      match &result {
        Ok(()) => {
          if let Err(e) = persist_success(store, environment, project, service).await {
            warn!("deployed '{name}' but failed to persist its state: {e:#}");
          }
        }
        Err(e) => warn!("failed to deploy '{name}': {e:#}"),
      }

      outcomes.push(ServiceDeploymentOutcome {
        service: name.clone(),
        image: image_ref,
        success: result.is_ok(),
        message: result.err().map(|e| format!("{e:#}")),
      });
    }
  }

  let record = build_record(project, environment, outcomes, start, triggered_by);
  store.deployment_history(&environment.name).record(&record).await?;
  Ok(record)
}

async fn remove_one(
  session: &transport::Session,
  qualified_name: &str,
  clustered: bool,
) -> anyhow::Result<()> {
  if clustered {
    let out = session
      .execute(&format!("docker service rm {}", command::quote(qualified_name)))
      .await?;
    if !out.success && !out.stderr.contains("not found") {
      anyhow::bail!("docker service rm failed: {}", out.stderr.trim());
    }
  } else {
    single_host::remove_group(session, qualified_name).await?;
  }
  Ok(())
}

async fn deploy_one(
  session: &transport::Session,
  environment: &Environment,
  project: &str,
  project_root: &std::path::Path,
  service: &Service,
  old_config: Option<&Service>,
  clustered: bool,
  redactor: &Redactor,
) -> anyhow::Result<()> {
  hooks::validate(service).context("hook validation failed")?;

  let image_ref = service
    .image
    .image_reference()
    .context("service has a build image source; it must be built and tagged before deploy")?;

  let mut resolved_env = secrets::load_resolved(project_root, &environment.name)
    .await
    .context("failed to resolve secrets")?;
  for (key, value) in &service.env_map {
    resolved_env.insert(key.clone(), value.clone());
  }
  redactor.register_all(resolved_env.values().map(String::as_str));

  let replacers = redactor.replacement_pairs();

  hooks::run_stage("pre_deploy", &service.hooks.pre_deploy, &resolved_env, &replacers)
    .await
    .context("pre_deploy hook failed")?;

  let env_file = secrets::materialize_env_file(project, &service.name, &resolved_env)
    .await
    .context("failed to materialize env file")?;

  let qualified_name = model::qualified_service_name(project, &environment.name, &service.name);
  let ctx = BuildContext {
    project,
    environment,
    qualified_name: qualified_name.clone(),
    env_file_path: env_file.path(),
  };

  let deploy_result: anyhow::Result<()> = async {
    if clustered {
      let proxy_labels: indexmap::IndexMap<String, String> =
        cluster::labels_for_service(&qualified_name, service).into_iter().collect();

      let exists = session
        .execute(&format!(
          "docker service inspect {} --format '{{{{.ID}}}}' 2>/dev/null",
          command::quote(&qualified_name)
        ))
        .await?;

      let cmd = if exists.success && !exists.stdout.trim().is_empty() {
        let old = old_config.cloned().unwrap_or_else(|| service.clone());
        let same_tag = old.image.image_reference() == Some(image_ref);
        command_builder::update_command(&ctx, &old, service, image_ref, same_tag, &proxy_labels)?
      } else {
        command_builder::create_command(&ctx, service, image_ref, &proxy_labels)?
      };

      let out = session.execute(&cmd).await?;
      if !out.success {
        anyhow::bail!("docker service command failed: {}", out.stderr.trim());
      }
    } else {
      single_host::replace_group(session, &ctx, service, environment, image_ref).await?;
    }
    Ok(())
  }
  .await;

  env_file.cleanup().await.ok();
  deploy_result.context("failed to apply service")?;

  hooks::run_stage("post_deploy", &service.hooks.post_deploy, &resolved_env, &replacers)
    .await
    .context("post_deploy hook failed")?;
  hooks::run_stage("post_start", &service.hooks.post_start, &resolved_env, &replacers)
    .await
    .context("post_start hook failed")?;

  info!("deployed '{}' ({qualified_name})", service.name);
  Ok(())
}

async fn persist_success(
  store: &StateStore,
  environment: &Environment,
  project: &str,
  service: &Service,
) -> anyhow::Result<()> {
  let observed = model::ObservedService {
    name: service.name.clone(),
    image_reference: service.image.image_reference().unwrap_or_default().to_string(),
    desired_replicas: service.normalized_replicas(),
    running_replicas: service.normalized_replicas(),
    container_ids: Vec::new(),
    config_snapshot: Some(service.clone()),
  };
  store.save_service_state(&environment.name, &observed).await?;

  let urn = model::resource_urn(project, project, &environment.name, ResourceType::Service, &service.name);
  let resource = Resource {
    urn,
    ty: ResourceType::Service,
    provider: "docker".into(),
    status: ResourceStatus::Created,
    inputs: Default::default(),
    outputs: Default::default(),
    dependencies: service.depends_on.clone(),
    parent: None,
    inputs_hash: config_hash(service),
  };
  store.resources().upsert(&resource).await
}

fn config_hash(service: &Service) -> String {
  let bytes = serde_json::to_vec(service).unwrap_or_default();
  hex::encode(Sha256::digest(bytes))
}

fn build_record(
  project: &str,
  environment: &Environment,
  services: Vec<ServiceDeploymentOutcome>,
  start: std::time::Instant,
  triggered_by: &str,
) -> DeploymentRecord {
  let succeeded = services.iter().filter(|s| s.success).count();
  let status = if services.is_empty() || succeeded == services.len() {
    DeploymentStatus::Success
  } else if succeeded == 0 {
    DeploymentStatus::Failed
  } else {
    DeploymentStatus::Partial
  };

  DeploymentRecord {
    deployment_id: uuid::Uuid::new_v4().to_string(),
    timestamp: model::tako_timestamp(),
    environment: environment.name.clone(),
    mode: DeploymentMode::Sequential,
    status,
    duration_ms: start.elapsed().as_millis() as u64,
    services,
    network_info: Some(model::overlay_network_name(project, &environment.name)),
    volume_info: environment.volumes.keys().cloned().collect(),
    config_hash: config_hash_for_environment(environment),
    is_rollback_point: false,
    git_commit: None,
    triggered_by: triggered_by.to_string(),
  }
}

fn config_hash_for_environment(environment: &Environment) -> String {
  let bytes = serde_json::to_vec(&environment.services).unwrap_or_default();
  hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
  use std::time::Instant;

  use indexmap::IndexMap;

  use super::*;

  fn empty_environment() -> Environment {
    Environment {
      name: "prod".into(),
      member_servers: vec![],
      environment_labels: Default::default(),
      services: IndexMap::new(),
      volumes: IndexMap::new(),
    }
  }

  fn outcome(service: &str, success: bool) -> ServiceDeploymentOutcome {
    ServiceDeploymentOutcome {
      service: service.into(),
      image: "api:1".into(),
      success,
      message: None,
    }
  }

  #[test]
  fn empty_outcome_list_is_success() {
    let record = build_record("acme", &empty_environment(), Vec::new(), Instant::now(), "cli");
    assert_eq!(record.status, DeploymentStatus::Success);
  }

  #[test]
  fn all_succeeded_is_success() {
    let outcomes = vec![outcome("a", true), outcome("b", true)];
    let record = build_record("acme", &empty_environment(), outcomes, Instant::now(), "cli");
    assert_eq!(record.status, DeploymentStatus::Success);
  }

  #[test]
  fn mixed_outcomes_are_partial() {
    let outcomes = vec![outcome("a", true), outcome("b", false)];
    let record = build_record("acme", &empty_environment(), outcomes, Instant::now(), "cli");
    assert_eq!(record.status, DeploymentStatus::Partial);
  }

  #[test]
  fn all_failed_is_failed() {
    let outcomes = vec![outcome("a", false), outcome("b", false)];
    let record = build_record("acme", &empty_environment(), outcomes, Instant::now(), "cli");
    assert_eq!(record.status, DeploymentStatus::Failed);
  }
}
