//! Turns a desired configuration and an observed cluster state into a
//! [`model::Plan`] (§4.9). Pure and synchronous: every field it compares is
//! already in memory, supplied by `lib/resolver` and `lib/observer`.

mod diff;
mod render;

use indexmap::IndexMap;
use model::{Change, ObservedService, Plan, Service};

pub use render::render;

/// Builds a plan for `desired` against `observed`. Desired-only services
/// become additions, observed-only services become removals (unless
/// marked persistent, in which case they're preserved as a no-op), and
/// services present in both are diffed field-by-field via
/// [`diff::reasons_for_update`].
pub fn build_plan(
  project: &str,
  environment: &str,
  desired: &IndexMap<String, Service>,
  observed: &IndexMap<String, ObservedService>,
) -> Plan {
  let mut changes = Vec::new();

  for (name, service) in desired {
    match observed.get(name) {
      None => changes.push(Change::add(name, service.clone())),
      Some(observed_service) => {
        let reasons = diff::reasons_for_update(service, observed_service);
        if reasons.is_empty() {
          changes.push(Change::no_op(name, "matches last deployed configuration"));
        } else {
          let old_config = diff::old_config_for(service, observed_service);
          changes.push(Change::update(name, old_config, service.clone(), reasons));
        }
      }
    }
  }

  for (name, observed_service) in observed {
    if desired.contains_key(name) {
      continue;
    }
    if observed_service.is_persistent() {
      changes.push(Change::no_op(
        name,
        "no longer declared in configuration, but marked persistent; left in place",
      ));
    } else {
      changes.push(Change::remove(name, "no longer declared in configuration"));
    }
  }

  Plan::new(project, environment, changes)
}

#[cfg(test)]
mod tests {
  use model::ImageSource;

  use super::*;

  fn service(name: &str, image_reference: &str) -> Service {
    Service {
      name: name.into(),
      image: ImageSource::Image { image_reference: image_reference.to_string() },
      port: 8080,
      command: None,
      replicas: 1,
      restart_policy: Default::default(),
      env_map: Default::default(),
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

  fn observed_matching(service: &Service) -> ObservedService {
    ObservedService {
      name: service.name.clone(),
      image_reference: service.image.image_reference().unwrap().to_string(),
      desired_replicas: service.replicas,
      running_replicas: service.replicas,
      container_ids: vec![],
      config_snapshot: Some(service.clone()),
    }
  }

  #[test]
  fn new_service_becomes_an_addition() {
    let mut desired = IndexMap::new();
    desired.insert("web".to_string(), service("web", "api:1"));
    let observed = IndexMap::new();

    let plan = build_plan("proj", "prod", &desired, &observed);
    assert_eq!(plan.summary.adds, 1);
    assert_eq!(plan.changes[0].service, "web");
  }

  #[test]
  fn unchanged_service_is_a_no_op() {
    let web = service("web", "api:1");
    let mut desired = IndexMap::new();
    desired.insert("web".to_string(), web.clone());
    let mut observed = IndexMap::new();
    observed.insert("web".to_string(), observed_matching(&web));

    let plan = build_plan("proj", "prod", &desired, &observed);
    assert_eq!(plan.summary.no_ops, 1);
    assert_eq!(plan.summary.updates, 0);
  }

  #[test]
  fn changed_image_becomes_an_update_with_a_reason() {
    let old = service("web", "api:1");
    let mut desired = IndexMap::new();
    let new = service("web", "api:2");
    desired.insert("web".to_string(), new.clone());
    let mut observed = IndexMap::new();
    observed.insert("web".to_string(), observed_matching(&old));

    let plan = build_plan("proj", "prod", &desired, &observed);
    assert_eq!(plan.summary.updates, 1);
    let change = &plan.changes[0];
    assert!(change.reasons.iter().any(|r| r.contains("image changed")));
    assert_eq!(change.old_config.as_ref().unwrap().image, old.image);
    assert_eq!(change.new_config.as_ref().unwrap().image, new.image);
  }

  #[test]
  fn undeclared_service_is_removed() {
    let desired = IndexMap::new();
    let mut observed = IndexMap::new();
    observed.insert("orphan".to_string(), observed_matching(&service("orphan", "old:1")));

    let plan = build_plan("proj", "prod", &desired, &observed);
    assert_eq!(plan.summary.removes, 1);
    assert!(plan.has_destructive_changes());
  }

  #[test]
  fn undeclared_persistent_service_is_preserved_as_no_op() {
    let desired = IndexMap::new();
    let mut orphan = service("orphan", "old:1");
    orphan.persistent = true;
    let mut observed = IndexMap::new();
    observed.insert("orphan".to_string(), observed_matching(&orphan));

    let plan = build_plan("proj", "prod", &desired, &observed);
    assert_eq!(plan.summary.removes, 0);
    assert_eq!(plan.summary.no_ops, 1);
    assert!(!plan.has_destructive_changes());
  }
}
