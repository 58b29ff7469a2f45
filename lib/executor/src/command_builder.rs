use indexmap::IndexMap;
use model::{Environment, PlacementStrategy, RestartPolicy, Service, VolumeMount};

use crate::placement;

/// Everything the command builder needs besides the [`Service`] itself:
/// the namespaced identifiers and the environment's volume declarations,
/// so a [`VolumeMount`] can be resolved to its on-cluster name.
pub struct BuildContext<'a> {
  pub project: &'a str,
  pub environment: &'a Environment,
  pub qualified_name: String,
  pub env_file_path: &'a std::path::Path,
}

fn restart_condition(policy: RestartPolicy) -> &'static str {
  match policy {
    RestartPolicy::Any => "any",
    RestartPolicy::OnFailure => "on-failure",
    RestartPolicy::None => "none",
  }
}

fn mount_flag(ctx: &BuildContext, mount: &VolumeMount) -> String {
  if mount.bind {
    let ro = if mount.read_only { ",readonly" } else { "" };
    return format!(
      "--mount type=bind,source={},destination={}{ro}",
      command::quote(&mount.source),
      command::quote(&mount.target)
    );
  }

  let source = ctx
    .environment
    .volumes
    .get(&mount.source)
    .map(|v| v.qualified_name(ctx.project, &ctx.environment.name))
    .unwrap_or_else(|| mount.source.clone());
  let ro = if mount.read_only { ",readonly" } else { "" };
  format!(
    "--mount type=volume,source={},destination={}{ro}",
    command::quote(&source),
    command::quote(&mount.target)
  )
}

fn health_check_flags(service: &Service) -> String {
  let Some(health) = &service.health_check else {
    return " --no-healthcheck".to_string();
  };
  format!(
    " --health-cmd {} --health-interval {}s --health-timeout {}s --health-retries {} --health-start-period {}s",
    command::quote(&format!("curl -f http://localhost:{}{} || exit 1", service.port, health.path)),
    health.interval,
    health.timeout,
    health.retries,
    health.start_period,
  )
}

/// Builds the `docker service create` command for a new cluster service
/// (§4.11/§4.12). `proxy_labels` come from `cluster::labels_for_service`.
pub fn create_command(
  ctx: &BuildContext,
  service: &Service,
  image_ref: &str,
  proxy_labels: &IndexMap<String, String>,
) -> anyhow::Result<String> {
  let name = &ctx.qualified_name;
  let mut cmd = format!("docker service create --name {}", command::quote(name));

  if service.placement.strategy == PlacementStrategy::Global {
    cmd.push_str(" --mode global");
  } else {
    cmd.push_str(&format!(" --replicas {}", service.normalized_replicas()));
  }
  cmd.push_str(&placement::compile(&service.placement)?);

  cmd.push_str(&format!(
    " --network name={},alias={}",
    command::quote(&model::overlay_network_name(ctx.project, &ctx.environment.name)),
    command::quote(&service.name)
  ));

  cmd.push_str(&format!(
    " --restart-condition {}",
    restart_condition(service.restart_policy)
  ));
  cmd.push_str(" --update-parallelism 1 --update-delay 10s --update-failure-action rollback");
  cmd.push_str(" --rollback-parallelism 1 --rollback-delay 5s");

  cmd.push_str(&format!(" --env-file {}", command::quote(&ctx.env_file_path.display().to_string())));

  for mount in &service.volume_mounts {
    cmd.push_str(&format!(" {}", mount_flag(ctx, mount)));
  }

  if service.proxy.is_none() && service.port != 0 {
    cmd.push_str(&format!(" --publish published={},target={}", service.port, service.port));
  }
  for (key, value) in proxy_labels {
    cmd.push_str(&format!(" --label {}", command::quote(&format!("{key}={value}"))));
  }

  cmd.push_str(&health_check_flags(service));

  cmd.push_str(&format!(" {}", command::quote(image_ref)));
  if let Some(command_override) = &service.command {
    cmd.push_str(&format!(" {command_override}"));
  }

  Ok(cmd)
}

/// Builds the `docker service update` command to bring an existing
/// cluster service in line with `service`. Unlike create, env and
/// mounts must be diffed against `old` and expressed as
/// `--env-rm`/`--env-add`/`--mount-rm`/`--mount-add` pairs rather than
/// replaced wholesale.
pub fn update_command(
  ctx: &BuildContext,
  old: &Service,
  service: &Service,
  image_ref: &str,
  same_image_tag: bool,
  proxy_labels: &IndexMap<String, String>,
) -> anyhow::Result<String> {
  let name = &ctx.qualified_name;
  let mut cmd = String::from("docker service update");

  if service.placement.strategy != PlacementStrategy::Global {
    cmd.push_str(&format!(" --replicas {}", service.normalized_replicas()));
  }

  for key in old.env_map.keys() {
    if !service.env_map.contains_key(key) || service.env_map[key] != old.env_map[key] {
      cmd.push_str(&format!(" --env-rm {}", command::quote(key)));
    }
  }
  for (key, value) in &service.env_map {
    if old.env_map.get(key) != Some(value) {
      cmd.push_str(&format!(" --env-add {}", command::quote(&format!("{key}={value}"))));
    }
  }

  let old_targets: Vec<&VolumeMount> = old.volume_mounts.iter().collect();
  let new_targets: Vec<&VolumeMount> = service.volume_mounts.iter().collect();
  for mount in &old_targets {
    let still_present = new_targets.iter().any(|m| {
      m.target == mount.target && m.source == mount.source && m.read_only == mount.read_only
    });
    if !still_present {
      cmd.push_str(&format!(" --mount-rm {}", command::quote(&mount.target)));
    }
  }
  for mount in &new_targets {
    let already_present = old_targets.iter().any(|m| {
      m.target == mount.target && m.source == mount.source && m.read_only == mount.read_only
    });
    if !already_present {
      cmd.push_str(&format!(" --mount-add {}", mount_flag(ctx, mount).trim_start_matches("--mount ")));
    }
  }

  for key in proxy_labels.keys() {
    cmd.push_str(&format!(" --label-rm {}", command::quote(key)));
  }
  for (key, value) in proxy_labels {
    cmd.push_str(&format!(" --label-add {}", command::quote(&format!("{key}={value}"))));
  }

  cmd.push_str(&format!(" --image {}", command::quote(image_ref)));
  if same_image_tag {
    cmd.push_str(" --force");
  }

  cmd.push_str(&format!(" {}", command::quote(name)));
  Ok(cmd)
}

#[cfg(test)]
mod tests {
  use model::{ImageSource, NamedVolume, Placement};

  use super::*;

  fn env(services: IndexMap<String, Service>) -> Environment {
    Environment {
      name: "prod".into(),
      member_servers: vec![],
      environment_labels: Default::default(),
      services,
      volumes: {
        let mut v = IndexMap::new();
        v.insert(
          "data".to_string(),
          NamedVolume {
            key: "data".into(),
            driver: None,
            driver_opts: Default::default(),
            labels: Default::default(),
            external: false,
            explicit_name: None,
          },
        );
        v
      },
    }
  }

  fn base_service() -> Service {
    Service {
      name: "web".into(),
      image: ImageSource::Image { image_reference: "api:1".into() },
      port: 8080,
      command: None,
      replicas: 2,
      restart_policy: Default::default(),
      env_map: Default::default(),
      env_file_path: None,
      secret_refs: vec![],
      volume_mounts: vec![VolumeMount {
        source: "data".into(),
        target: "/data".into(),
        read_only: false,
        bind: false,
      }],
      init_commands: vec![],
      persistent: false,
      exports: vec![],
      imports: vec![],
      proxy: None,
      placement: Placement::default(),
      depends_on: vec![],
      health_check: None,
      hooks: Default::default(),
    }
  }

  #[test]
  fn create_command_includes_replicas_network_and_mounts() {
    let service = base_service();
    let environment = env(IndexMap::new());
    let ctx = BuildContext {
      project: "acme",
      environment: &environment,
      qualified_name: "acme_prod_web".into(),
      env_file_path: std::path::Path::new("/tmp/acme-web.env"),
    };
    let cmd = create_command(&ctx, &service, "api:1", &IndexMap::new()).unwrap();
    assert!(cmd.contains("--replicas 2"));
    assert!(cmd.contains("tako_acme_prod"));
    assert!(cmd.contains("acme_prod_data"));
    assert!(cmd.contains("--publish published=8080,target=8080"));
  }

  #[test]
  fn create_command_skips_publish_when_proxied() {
    let mut service = base_service();
    service.proxy = Some(model::ProxyConfig {
      primary_domain: "web.example.com".into(),
      redirect_from: vec![],
      legacy_domains: vec![],
      email_for_certificate: None,
      tls_config: None,
    });
    let environment = env(IndexMap::new());
    let ctx = BuildContext {
      project: "acme",
      environment: &environment,
      qualified_name: "acme_prod_web".into(),
      env_file_path: std::path::Path::new("/tmp/acme-web.env"),
    };
    let cmd = create_command(&ctx, &service, "api:1", &IndexMap::new()).unwrap();
    assert!(!cmd.contains("--publish"));
  }

  #[test]
  fn global_mode_skips_replicas_flag() {
    let mut service = base_service();
    service.placement.strategy = PlacementStrategy::Global;
    let environment = env(IndexMap::new());
    let ctx = BuildContext {
      project: "acme",
      environment: &environment,
      qualified_name: "acme_prod_web".into(),
      env_file_path: std::path::Path::new("/tmp/acme-web.env"),
    };
    let cmd = create_command(&ctx, &service, "api:1", &IndexMap::new()).unwrap();
    assert!(cmd.contains("--mode global"));
    assert!(!cmd.contains("--replicas"));
  }

  #[test]
  fn update_command_diffs_env_vars() {
    let mut old = base_service();
    old.env_map.insert("A".to_string(), "1".to_string());
    old.env_map.insert("B".to_string(), "1".to_string());
    let mut new = base_service();
    new.env_map.insert("B".to_string(), "2".to_string());
    new.env_map.insert("C".to_string(), "3".to_string());

    let environment = env(IndexMap::new());
    let ctx = BuildContext {
      project: "acme",
      environment: &environment,
      qualified_name: "acme_prod_web".into(),
      env_file_path: std::path::Path::new("/tmp/acme-web.env"),
    };
    let cmd = update_command(&ctx, &old, &new, "api:1", false, &IndexMap::new()).unwrap();
    assert!(cmd.contains("--env-rm 'A'"));
    assert!(cmd.contains("--env-rm 'B'"));
    assert!(cmd.contains("--env-add 'B=2'"));
    assert!(cmd.contains("--env-add 'C=3'"));
  }

  #[test]
  fn update_command_forces_restart_on_same_tag() {
    let old = base_service();
    let new = base_service();
    let environment = env(IndexMap::new());
    let ctx = BuildContext {
      project: "acme",
      environment: &environment,
      qualified_name: "acme_prod_web".into(),
      env_file_path: std::path::Path::new("/tmp/acme-web.env"),
    };
    let cmd = update_command(&ctx, &old, &new, "api:1", true, &IndexMap::new()).unwrap();
    assert!(cmd.contains("--force"));
  }
}
