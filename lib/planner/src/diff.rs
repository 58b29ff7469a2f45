use model::{ImageSource, ObservedService, Service};

/// Reasons an already-deployed service needs to be redeployed (§4.9). The
/// image and replica checks compare against what's directly observed on
/// the cluster; the rest compare against the last snapshot this
/// orchestrator recorded, since the live cluster doesn't expose env vars,
/// build context, or volume mounts on a listing call.
pub fn reasons_for_update(desired: &Service, observed: &ObservedService) -> Vec<String> {
  let mut reasons = Vec::new();

  if let Some(image_ref) = desired.image.image_reference()
    && image_ref != observed.image_reference
  {
    reasons.push(format!(
      "image changed: '{}' -> '{image_ref}'",
      observed.image_reference
    ));
  }

  let desired_replicas = desired.normalized_replicas();
  let observed_replicas =
    if observed.desired_replicas == 0 { 1 } else { observed.desired_replicas };
  if desired_replicas != observed_replicas {
    reasons.push(format!("replicas changed: {observed_replicas} -> {desired_replicas}"));
  }

  if let Some(old) = &observed.config_snapshot {
    if old.port != 0 && desired.port != 0 && old.port != desired.port {
      reasons.push(format!("port changed: {} -> {}", old.port, desired.port));
    }
    if old.env_map != desired.env_map {
      reasons.push("environment variables changed".to_string());
    }
    if old.image.build_context_path() != desired.image.build_context_path() {
      reasons.push("build context changed".to_string());
    }
    let old_domain = old.proxy.as_ref().map(|p| p.primary_domain.as_str());
    let new_domain = desired.proxy.as_ref().map(|p| p.primary_domain.as_str());
    if old_domain != new_domain {
      reasons.push("proxy domain changed".to_string());
    }
    if old.volume_mounts != desired.volume_mounts {
      reasons.push("volume mounts changed".to_string());
    }
  }

  reasons
}

/// Approximates the "old" config for a [`model::Change::update`] when the
/// state store never recorded a snapshot for this service — e.g. it was
/// deployed by a previous version of the orchestrator, or adopted from an
/// already-running cluster. Falls back to the desired config with only
/// the directly-observable fields (image, replicas) overridden.
pub fn old_config_for(desired: &Service, observed: &ObservedService) -> Service {
  if let Some(snapshot) = &observed.config_snapshot {
    return snapshot.clone();
  }
  let mut approx = desired.clone();
  approx.image = ImageSource::Image { image_reference: observed.image_reference.clone() };
  approx.replicas = observed.desired_replicas;
  approx
}

#[cfg(test)]
mod tests {
  use model::ProxyConfig;

  use super::*;

  fn base_service(image_reference: &str) -> Service {
    Service {
      name: "web".into(),
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
  fn no_reasons_when_config_is_unchanged() {
    let service = base_service("api:1");
    let observed = observed_matching(&service);
    assert!(reasons_for_update(&service, &observed).is_empty());
  }

  #[test]
  fn detects_image_change_from_observed_field() {
    let mut observed = observed_matching(&base_service("api:1"));
    let desired = base_service("api:2");
    observed.config_snapshot = Some(desired.clone());
    observed.image_reference = "api:1".to_string();
    let reasons = reasons_for_update(&desired, &observed);
    assert!(reasons.iter().any(|r| r.contains("image changed")));
  }

  #[test]
  fn detects_proxy_domain_change_via_snapshot() {
    let old = base_service("api:1");
    let mut observed = observed_matching(&old);
    let mut desired = old.clone();
    desired.proxy = Some(ProxyConfig {
      primary_domain: "new.example.com".into(),
      redirect_from: vec![],
      legacy_domains: vec![],
      email_for_certificate: None,
      tls_config: None,
    });
    observed.config_snapshot = Some(old);
    let reasons = reasons_for_update(&desired, &observed);
    assert!(reasons.iter().any(|r| r.contains("proxy domain")));
  }

  #[test]
  fn ignores_port_change_without_a_snapshot() {
    let mut observed = observed_matching(&base_service("api:1"));
    observed.config_snapshot = None;
    let mut desired = base_service("api:1");
    desired.port = 9090;
    assert!(reasons_for_update(&desired, &observed).is_empty());
  }
}
