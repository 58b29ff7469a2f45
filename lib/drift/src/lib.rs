//! Finer-grained variant of the planner's diff (§4.9 "Drift variant
//! (C12)"): rather than one coarse "this service needs redeploying"
//! reason, this classifies every individual divergent field — an env
//! variable, a volume mount target, a proxy label key, the replica
//! count — as `manual` (only the live cluster has it) or `missing`
//! (only the desired config declares it).

use indexmap::IndexMap;
use model::{DriftItem, DriftKind, DriftSeverity, ObservedService, Service, replica_down_severity};

fn item(service: &str, field: impl Into<String>, kind: DriftKind, severity: DriftSeverity, detail: impl Into<String>) -> DriftItem {
  DriftItem { service: service.to_string(), field: field.into(), kind, severity, detail: detail.into() }
}

/// Computes every drift item for one service. Env/volume/label diffs
/// require a `config_snapshot` on `observed` — without one, the only
/// thing this orchestrator can compare is the directly observed replica
/// count.
pub fn compare_service(qualified_name: &str, desired: &Service, observed: &ObservedService) -> Vec<DriftItem> {
  let mut items = replica_drift(desired, observed);

  if let Some(snapshot) = &observed.config_snapshot {
    items.extend(env_drift(snapshot, desired));
    items.extend(volume_drift(snapshot, desired));
    items.extend(label_drift(qualified_name, snapshot, desired));
  }

  items
}

fn replica_drift(desired: &Service, observed: &ObservedService) -> Vec<DriftItem> {
  let expected = desired.normalized_replicas();
  let actual = observed.running_replicas;
  if actual == expected {
    return Vec::new();
  }
  if actual < expected {
    vec![item(
      &desired.name,
      "replicas",
      DriftKind::Missing,
      replica_down_severity(actual, expected),
      format!("{actual}/{expected} replicas running"),
    )]
  } else {
    vec![item(
      &desired.name,
      "replicas",
      DriftKind::Manual,
      DriftSeverity::Low,
      format!("{actual}/{expected} replicas running (scaled up outside of deploy)"),
    )]
  }
}

fn env_drift(observed_config: &Service, desired: &Service) -> Vec<DriftItem> {
  let mut items = Vec::new();
  for (key, value) in &observed_config.env_map {
    if !desired.env_map.contains_key(key) {
      items.push(item(
        &desired.name,
        format!("env:{key}"),
        DriftKind::Manual,
        DriftSeverity::Medium,
        format!("'{key}' is set live ({value}) but not declared"),
      ));
    } else if desired.env_map.get(key) != Some(value) {
      items.push(item(
        &desired.name,
        format!("env:{key}"),
        DriftKind::Manual,
        DriftSeverity::Low,
        format!("'{key}' value diverges from the last deployed value"),
      ));
    }
  }
  for key in desired.env_map.keys() {
    if !observed_config.env_map.contains_key(key) {
      items.push(item(
        &desired.name,
        format!("env:{key}"),
        DriftKind::Missing,
        DriftSeverity::Medium,
        format!("'{key}' is declared but was never deployed"),
      ));
    }
  }
  items
}

fn volume_drift(observed_config: &Service, desired: &Service) -> Vec<DriftItem> {
  let mut items = Vec::new();
  for mount in &observed_config.volume_mounts {
    if !desired.volume_mounts.iter().any(|m| m.target == mount.target) {
      items.push(item(
        &desired.name,
        format!("volume:{}", mount.target),
        DriftKind::Manual,
        DriftSeverity::High,
        format!("mount at '{}' exists live but isn't declared", mount.target),
      ));
    }
  }
  for mount in &desired.volume_mounts {
    if !observed_config.volume_mounts.iter().any(|m| m.target == mount.target) {
      items.push(item(
        &desired.name,
        format!("volume:{}", mount.target),
        DriftKind::Missing,
        DriftSeverity::High,
        format!("mount at '{}' is declared but was never deployed", mount.target),
      ));
    }
  }
  items
}

fn label_drift(qualified_name: &str, observed_config: &Service, desired: &Service) -> Vec<DriftItem> {
  let old_labels: IndexMap<String, String> =
    cluster::labels_for_service(qualified_name, observed_config).into_iter().collect();
  let new_labels: IndexMap<String, String> =
    cluster::labels_for_service(qualified_name, desired).into_iter().collect();

  let mut items = Vec::new();
  for key in old_labels.keys() {
    if !new_labels.contains_key(key) {
      items.push(item(&desired.name, format!("label:{key}"), DriftKind::Manual, DriftSeverity::Low, "proxy label set live but no longer declared"));
    }
  }
  for key in new_labels.keys() {
    if !old_labels.contains_key(key) {
      items.push(item(&desired.name, format!("label:{key}"), DriftKind::Missing, DriftSeverity::Low, "proxy label declared but not yet applied"));
    }
  }
  items
}

#[cfg(test)]
mod tests {
  use model::ImageSource;

  use super::*;

  fn service(env: &[(&str, &str)]) -> Service {
    Service {
      name: "web".into(),
      image: ImageSource::Image { image_reference: "api:1".into() },
      port: 8080,
      command: None,
      replicas: 2,
      restart_policy: Default::default(),
      env_map: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
      env_file_path: None,
      secret_refs: vec![],
      volume_mounts: vec![],
      init_commands: vec![],
      persistent: false,
      exports: vec![],
      imports: vec![],
      proxy: None,
      placement: Default::default(),
      depends_on: vec![],
      health_check: None,
      hooks: Default::default(),
    }
  }

  fn observed(desired: &Service, running: u32, snapshot: Option<Service>) -> ObservedService {
    ObservedService {
      name: desired.name.clone(),
      image_reference: "api:1".into(),
      desired_replicas: desired.replicas,
      running_replicas: running,
      container_ids: vec![],
      config_snapshot: snapshot,
    }
  }

  #[test]
  fn flags_replicas_down_as_missing() {
    let desired = service(&[]);
    let obs = observed(&desired, 0, None);
    let items = compare_service("acme_prod_web", &desired, &obs);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, DriftKind::Missing);
    assert_eq!(items[0].severity, DriftSeverity::Critical);
  }

  #[test]
  fn flags_replicas_up_as_manual() {
    let desired = service(&[]);
    let obs = observed(&desired, 5, None);
    let items = compare_service("acme_prod_web", &desired, &obs);
    assert_eq!(items[0].kind, DriftKind::Manual);
  }

  #[test]
  fn flags_live_only_env_var_as_manual() {
    let desired = service(&[]);
    let snapshot = service(&[("EXTRA", "1")]);
    let obs = observed(&desired, 2, Some(snapshot));
    let items = compare_service("acme_prod_web", &desired, &obs);
    assert!(items.iter().any(|i| i.field == "env:EXTRA" && i.kind == DriftKind::Manual));
  }

  #[test]
  fn flags_declared_only_env_var_as_missing() {
    let desired = service(&[("NEW", "1")]);
    let snapshot = service(&[]);
    let obs = observed(&desired, 2, Some(snapshot));
    let items = compare_service("acme_prod_web", &desired, &obs);
    assert!(items.iter().any(|i| i.field == "env:NEW" && i.kind == DriftKind::Missing));
  }

  #[test]
  fn no_snapshot_skips_fine_grained_checks() {
    let desired = service(&[("NEW", "1")]);
    let obs = observed(&desired, 2, None);
    let items = compare_service("acme_prod_web", &desired, &obs);
    assert!(items.is_empty());
  }
}
