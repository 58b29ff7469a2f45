use std::collections::BTreeMap;

use anyhow::bail;
use model::Service;
use transport::Session;

pub const PROXY_SERVICE_NAME: &str = "tako_reverse_proxy";
const DEFAULT_CERT_RESOLVER: &str = "letsencrypt";

/// Builds the Traefik routing labels for one service's cluster-service
/// spec, per §4.5's label semantics. Returns an empty map when the service
/// has no [`model::ProxyConfig`] — most services never opt into routing.
pub fn labels_for_service(
  qualified_name: &str,
  service: &Service,
) -> BTreeMap<String, String> {
  let mut labels = BTreeMap::new();
  let Some(proxy) = &service.proxy else {
    return labels;
  };

  let router = qualified_name;
  labels.insert("traefik.enable".into(), "true".into());

  labels.insert(
    format!("traefik.http.routers.{router}.rule"),
    format!("Host(`{}`)", proxy.primary_domain),
  );
  labels.insert(
    format!("traefik.http.routers.{router}.entrypoints"),
    "websecure".into(),
  );
  if proxy.email_for_certificate.is_some() {
    let resolver = proxy
      .tls_config
      .as_ref()
      .and_then(|tls| tls.cert_resolver.clone())
      .unwrap_or_else(|| DEFAULT_CERT_RESOLVER.to_string());
    labels.insert(
      format!("traefik.http.routers.{router}.tls.certresolver"),
      resolver,
    );
  }

  // HTTP -> HTTPS redirect, sharing one middleware across every service.
  labels.insert(
    "traefik.http.middlewares.https-redirect.redirectscheme.scheme".into(),
    "https".into(),
  );
  labels.insert(
    "traefik.http.middlewares.https-redirect.redirectscheme.permanent".into(),
    "true".into(),
  );
  labels.insert(
    format!("traefik.http.routers.{router}-http.rule"),
    format!("Host(`{}`)", proxy.primary_domain),
  );
  labels.insert(
    format!("traefik.http.routers.{router}-http.entrypoints"),
    "web".into(),
  );
  labels.insert(
    format!("traefik.http.routers.{router}-http.middlewares"),
    "https-redirect".into(),
  );

  for (i, domain) in proxy.legacy_domains.iter().enumerate() {
    labels.insert(
      format!("traefik.http.routers.{router}-legacy-{i}.rule"),
      format!("Host(`{domain}`)"),
    );
    labels.insert(
      format!("traefik.http.routers.{router}-legacy-{i}.entrypoints"),
      "websecure".into(),
    );
    labels.insert(
      format!("traefik.http.routers.{router}-legacy-{i}.service"),
      router.to_string(),
    );
  }

  for (i, domain) in proxy.redirect_from.iter().enumerate() {
    let mw = format!("{router}-redirect-{i}");
    labels.insert(
      format!("traefik.http.middlewares.{mw}.redirectregex.regex"),
      format!("^https?://{domain}/(.*)"),
    );
    labels.insert(
      format!("traefik.http.middlewares.{mw}.redirectregex.replacement"),
      format!("https://{}/${{1}}", proxy.primary_domain),
    );
    labels.insert(
      format!("traefik.http.middlewares.{mw}.redirectregex.permanent"),
      "true".into(),
    );
    labels.insert(
      format!("traefik.http.routers.{router}-redirect-{i}.rule"),
      format!("Host(`{domain}`)"),
    );
    labels.insert(
      format!("traefik.http.routers.{router}-redirect-{i}.entrypoints"),
      "websecure".into(),
    );
    labels.insert(
      format!("traefik.http.routers.{router}-redirect-{i}.middlewares"),
      mw,
    );
  }

  labels.insert(
    format!("traefik.http.services.{router}.loadbalancer.server.port"),
    service.port.to_string(),
  );
  if let Some(health) = &service.health_check {
    labels.insert(
      format!("traefik.http.services.{router}.loadbalancer.healthcheck.path"),
      health.path.clone(),
    );
    labels.insert(
      format!("traefik.http.services.{router}.loadbalancer.healthcheck.interval"),
      format!("{}s", health.interval),
    );
  }

  labels
}

fn exists(stderr_or_out: &str) -> bool {
  !stderr_or_out.trim().is_empty()
}

/// Ensures the reverse-proxy sidecar is running on the manager node,
/// constrained there, single-replica, restart-any, entirely configured via
/// CLI flags (§4.5). A no-op if the service already exists — updating its
/// flags is an explicit redeploy, not something bootstrap does implicitly.
pub async fn ensure_sidecar(
  manager_session: &Session,
  acme_dir: &str,
  log_dir: &str,
) -> anyhow::Result<()> {
  let probe = manager_session
    .execute(&format!(
      "docker service inspect {} --format '{{{{.ID}}}}' 2>/dev/null",
      command::quote(PROXY_SERVICE_NAME)
    ))
    .await?;
  if exists(&probe.stdout) {
    return Ok(());
  }

  let out = manager_session
    .execute(&sidecar_create_command(acme_dir, log_dir))
    .await?;
  if !out.success {
    bail!("failed to deploy reverse-proxy sidecar: {}", out.stderr.trim());
  }
  Ok(())
}

fn sidecar_create_command(acme_dir: &str, log_dir: &str) -> String {
  format!(
    "docker service create \
     --name {name} \
     --constraint node.role==manager \
     --replicas 1 \
     --restart-condition any \
     --mount type=bind,source=/var/run/docker.sock,destination=/var/run/docker.sock,readonly \
     --mount type=bind,source={acme},destination=/acme \
     --mount type=bind,source={logs},destination=/logs \
     --publish published=80,target=80 \
     --publish published=443,target=443 \
     traefik:v3.1 \
     --providers.swarm \
     --providers.swarm.exposedbydefault=false \
     --entrypoints.web.address=:80 \
     --entrypoints.websecure.address=:443 \
     --certificatesresolvers.{resolver}.acme.storage=/acme/acme.json \
     --certificatesresolvers.{resolver}.acme.httpchallenge.entrypoint=web \
     --log.filepath=/logs/traefik.log",
    name = command::quote(PROXY_SERVICE_NAME),
    acme = command::quote(acme_dir),
    logs = command::quote(log_dir),
    resolver = DEFAULT_CERT_RESOLVER,
  )
}

#[cfg(test)]
mod tests {
  use model::{HealthCheck, ProxyConfig};

  use super::*;

  fn service_with_proxy() -> Service {
    Service {
      name: "web".into(),
      image: model::ImageSource::Image { image_reference: "acme/web:1".into() },
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
      proxy: Some(ProxyConfig {
        primary_domain: "app.example.com".into(),
        redirect_from: vec!["www.app.example.com".into()],
        legacy_domains: vec![],
        email_for_certificate: Some("ops@example.com".into()),
        tls_config: None,
      }),
      placement: Default::default(),
      depends_on: vec![],
      health_check: Some(HealthCheck {
        path: "/healthz".into(),
        interval: 10,
        timeout: 5,
        retries: 3,
        start_period: 0,
      }),
      hooks: Default::default(),
    }
  }

  #[test]
  fn builds_router_and_service_labels() {
    let service = service_with_proxy();
    let labels = labels_for_service("acme_prod_web", &service);
    assert_eq!(labels.get("traefik.enable").unwrap(), "true");
    assert_eq!(
      labels.get("traefik.http.routers.acme_prod_web.rule").unwrap(),
      "Host(`app.example.com`)"
    );
    assert_eq!(
      labels.get("traefik.http.routers.acme_prod_web.tls.certresolver").unwrap(),
      "letsencrypt"
    );
    assert_eq!(
      labels.get("traefik.http.services.acme_prod_web.loadbalancer.server.port").unwrap(),
      "8080"
    );
  }

  #[test]
  fn no_proxy_config_yields_no_labels() {
    let mut service = service_with_proxy();
    service.proxy = None;
    assert!(labels_for_service("acme_prod_web", &service).is_empty());
  }

  #[test]
  fn builds_redirect_from_middleware() {
    let service = service_with_proxy();
    let labels = labels_for_service("acme_prod_web", &service);
    assert!(labels.contains_key(
      "traefik.http.middlewares.acme_prod_web-redirect-0.redirectregex.regex"
    ));
  }
}
