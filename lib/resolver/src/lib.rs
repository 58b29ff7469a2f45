//! Dependency ordering for a service map (§4.7): explicit `depends_on`
//! edges plus heuristically inferred ones from environment-variable
//! contents, resolved into a deterministic topological order via Kahn's
//! algorithm.

mod inference;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use model::Service;

/// Every dependency edge for one service: explicit `depends_on` plus
/// whatever [`inference::value_references_service`] turned up. Keyed by
/// dependent service name, values are the services it depends on.
pub fn dependency_edges(
  services: &IndexMap<String, Service>,
) -> anyhow::Result<BTreeMap<String, BTreeSet<String>>> {
  let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

  for (name, service) in services {
    let mut deps = BTreeSet::new();

    for dep in &service.depends_on {
      if !services.contains_key(dep) {
        bail!(
          "service '{name}' declares depends_on '{dep}', which does not exist \
           in this environment"
        );
      }
      deps.insert(dep.clone());
    }

    for (other_name, _) in services {
      if other_name == name || deps.contains(other_name) {
        continue;
      }
      let inferred = service
        .env_values()
        .any(|(key, value)| inference::value_references_service(key, value, other_name));
      if inferred {
        deps.insert(other_name.clone());
      }
    }

    edges.insert(name.clone(), deps);
  }

  Ok(edges)
}

/// Produces a permutation of `services`' keys such that every service's
/// dependencies (explicit and inferred) precede it. Both determinism
/// requirements from §4.7 are Kahn's-algorithm queue invariants: the
/// initial ready set and every subsequently-unblocked batch are processed
/// in lexicographic order, grounded on the same shape as a Cargo-workspace
/// publish-order resolver.
pub fn resolve_order(
  services: &IndexMap<String, Service>,
) -> anyhow::Result<Vec<String>> {
  let edges = dependency_edges(services).context("failed to compute dependency edges")?;

  let mut indegree: BTreeMap<String, usize> = BTreeMap::new();
  let mut dependents_of: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  for name in services.keys() {
    indegree.insert(name.clone(), edges.get(name).map(BTreeSet::len).unwrap_or(0));
    dependents_of.entry(name.clone()).or_default();
  }
  for (name, deps) in &edges {
    for dep in deps {
      dependents_of.entry(dep.clone()).or_default().insert(name.clone());
    }
  }

  let mut ready: BTreeSet<String> =
    indegree.iter().filter(|(_, deg)| **deg == 0).map(|(name, _)| name.clone()).collect();

  let mut order = Vec::with_capacity(services.len());
  while let Some(name) = ready.iter().next().cloned() {
    ready.remove(&name);
    order.push(name.clone());

    if let Some(dependents) = dependents_of.get(&name) {
      for dependent in dependents {
        let deg = indegree.get_mut(dependent).expect("dependent must have an indegree entry");
        *deg = deg.saturating_sub(1);
        if *deg == 0 {
          ready.insert(dependent.clone());
        }
      }
    }
  }

  if order.len() != services.len() {
    let stuck: Vec<&str> = indegree
      .iter()
      .filter(|(name, deg)| **deg > 0 && !order.contains(name))
      .map(|(name, _)| name.as_str())
      .collect();
    bail!("dependency cycle detected among services: {}", stuck.join(", "));
  }

  Ok(order)
}

#[cfg(test)]
mod tests {
  use model::ImageSource;

  use super::*;

  fn service(name: &str, depends_on: &[&str]) -> Service {
    Service {
      name: name.to_string(),
      image: ImageSource::Image { image_reference: format!("{name}:latest") },
      port: 0,
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
      depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
      health_check: None,
      hooks: Default::default(),
    }
  }

  #[test]
  fn orders_explicit_dependencies_before_dependents() {
    let mut services = IndexMap::new();
    services.insert("web".to_string(), service("web", &["api"]));
    services.insert("api".to_string(), service("api", &["db"]));
    services.insert("db".to_string(), service("db", &[]));

    let order = resolve_order(&services).unwrap();
    assert_eq!(order, vec!["db", "api", "web"]);
  }

  #[test]
  fn ties_break_lexicographically() {
    let mut services = IndexMap::new();
    services.insert("zeta".to_string(), service("zeta", &[]));
    services.insert("alpha".to_string(), service("alpha", &[]));
    services.insert("mid".to_string(), service("mid", &[]));

    let order = resolve_order(&services).unwrap();
    assert_eq!(order, vec!["alpha", "mid", "zeta"]);
  }

  #[test]
  fn detects_cycles_and_names_stuck_services() {
    let mut services = IndexMap::new();
    services.insert("a".to_string(), service("a", &["b"]));
    services.insert("b".to_string(), service("b", &["a"]));

    let err = resolve_order(&services).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains('a'));
    assert!(msg.contains('b'));
  }

  #[test]
  fn rejects_dependency_on_nonexistent_service() {
    let mut services = IndexMap::new();
    services.insert("web".to_string(), service("web", &["ghost"]));

    let err = resolve_order(&services).unwrap_err();
    assert!(format!("{err:#}").contains("does not exist"));
  }

  #[test]
  fn infers_dependency_from_connection_string_env_value() {
    let mut services = IndexMap::new();
    let mut web = service("web", &[]);
    web.env_map.insert("DATABASE_URL".to_string(), "postgres://db:5432/app".to_string());
    services.insert("web".to_string(), web);
    services.insert("db".to_string(), service("db", &[]));

    let order = resolve_order(&services).unwrap();
    assert_eq!(order, vec!["db", "web"]);
  }
}
