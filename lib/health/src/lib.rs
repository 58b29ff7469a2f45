//! Health prober (§4.13, C13): `check_service` fans out four concurrent
//! probes against a deployed service and its routed domain, plus a
//! "wait for SSL" loop used after a fresh proxy-fronted deploy.

mod tls;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;
use transport::Session;

pub use tls::TlsCertInfo;

/// SSL provisioning default timeout (§5).
pub const SSL_PROVISION_TIMEOUT: Duration = Duration::from_secs(120);
/// Service readiness default timeout (§5).
pub const SERVICE_READINESS_TIMEOUT: Duration = Duration::from_secs(300);

const SSL_WAIT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The combined result of the four probes. A probe that errors leaves its
/// positive field `false`/`None` and appends to `errors` rather than
/// aborting the others.
#[derive(Debug, Default, Clone)]
pub struct ServiceHealth {
  pub task_running: bool,
  pub proxy_enabled: bool,
  pub http_reachable: bool,
  pub http_status: Option<u16>,
  pub tls: Option<TlsCertInfo>,
  pub errors: Vec<String>,
}

impl ServiceHealth {
  /// A service is healthy once the cluster reports a running task and
  /// either it isn't proxied at all, or its HTTP surface answers.
  pub fn is_healthy(&self) -> bool {
    self.task_running && (!self.proxy_enabled || self.http_reachable)
  }
}

/// Runs the four probes from §4.13 concurrently against `qualified_name`
/// (the cluster-service name) and `domain` (the routed hostname, if any).
/// `domain` is `None` for services with no [`model::ProxyConfig`] — the
/// HTTP/HTTPS probes are skipped for those rather than reported as errors.
pub async fn check_service(
  session: &Session,
  qualified_name: &str,
  domain: Option<&str>,
) -> ServiceHealth {
  let result = Arc::new(Mutex::new(ServiceHealth::default()));

  let task_probe = probe_task_running(session, qualified_name, result.clone());
  let label_probe = probe_proxy_label(session, qualified_name, result.clone());

  match domain {
    Some(domain) => {
      let http_probe = probe_http(domain, result.clone());
      let https_probe = probe_https(domain, result.clone());
      tokio::join!(task_probe, label_probe, http_probe, https_probe);
    }
    None => {
      tokio::join!(task_probe, label_probe);
    }
  }

  Arc::try_unwrap(result)
    .expect("all probes have completed and dropped their clone")
    .into_inner()
}

async fn probe_task_running(session: &Session, qualified_name: &str, result: Arc<Mutex<ServiceHealth>>) {
  let outcome = session
    .execute(&format!(
      "docker service ps {} --filter desired-state=running --format '{{{{.CurrentState}}}}'",
      command::quote(qualified_name)
    ))
    .await;

  let mut guard = result.lock().await;
  match outcome {
    Ok(out) if out.success => {
      guard.task_running = out.stdout.lines().any(|line| line.trim_start().starts_with("Running"));
    }
    Ok(out) => guard.errors.push(format!("task-running probe failed: {}", out.stderr.trim())),
    Err(e) => guard.errors.push(format!("task-running probe failed: {e:#}")),
  }
}

async fn probe_proxy_label(session: &Session, qualified_name: &str, result: Arc<Mutex<ServiceHealth>>) {
  let outcome = session
    .execute(&format!(
      "docker service inspect {} --format '{{{{json .Spec.Labels}}}}'",
      command::quote(qualified_name)
    ))
    .await;

  let mut guard = result.lock().await;
  match outcome {
    Ok(out) if out.success => {
      guard.proxy_enabled = matches!(
        serde_json::from_str::<std::collections::HashMap<String, String>>(out.stdout.trim()),
        Ok(labels) if labels.get("traefik.enable").map(String::as_str) == Some("true")
      );
    }
    Ok(out) => guard.errors.push(format!("proxy-label probe failed: {}", out.stderr.trim())),
    Err(e) => guard.errors.push(format!("proxy-label probe failed: {e:#}")),
  }
}

async fn probe_http(domain: &str, result: Arc<Mutex<ServiceHealth>>) {
  let outcome = match http_client() {
    Ok(client) => client.get(format!("http://{domain}")).send().await.map_err(anyhow::Error::from),
    Err(e) => Err(e),
  };

  let mut guard = result.lock().await;
  match outcome {
    Ok(response) => {
      guard.http_reachable = true;
      guard.http_status = Some(response.status().as_u16());
    }
    Err(e) => guard.errors.push(format!("http probe failed: {e:#}")),
  }
}

async fn probe_https(domain: &str, result: Arc<Mutex<ServiceHealth>>) {
  let outcome = tls::fetch_cert_info(domain).await;
  let mut guard = result.lock().await;
  match outcome {
    Ok(info) => guard.tls = Some(info),
    Err(e) => guard.errors.push(format!("https probe failed: {e:#}")),
  }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
  reqwest::Client::builder()
    .redirect(reqwest::redirect::Policy::none())
    .timeout(Duration::from_secs(10))
    .build()
    .map_err(anyhow::Error::from)
}

/// Polls the HTTPS probe every 10 s until a certificate is observed or
/// `timeout` elapses. Every third poll also tails `proxy_log_path` on
/// `session` for well-known ACME failure substrings, failing fast instead
/// of waiting out the full timeout.
pub async fn wait_for_ssl(
  session: &Session,
  domain: &str,
  proxy_log_path: &str,
  timeout: Duration,
) -> anyhow::Result<TlsCertInfo> {
  let start = Instant::now();
  let mut poll: u32 = 0;

  loop {
    match tls::fetch_cert_info(domain).await {
      Ok(info) => return Ok(info),
      Err(e) => {
        if start.elapsed() >= timeout {
          anyhow::bail!("timed out after {:?} waiting for a certificate on '{domain}': {e:#}", timeout);
        }
        poll += 1;
        if poll % 3 == 0 {
          if let Some(reason) = tail_proxy_log_for_failure(session, proxy_log_path).await {
            anyhow::bail!("certificate provisioning for '{domain}' failed: {reason}");
          }
        }
        tokio::time::sleep(SSL_WAIT_POLL_INTERVAL).await;
      }
    }
  }
}

const FAILURE_SUBSTRINGS: &[&str] = &[
  "acme: error",
  "unable to generate a certificate",
  "error presenting token",
  "timeout during connect",
  "validation failed",
];

async fn tail_proxy_log_for_failure(session: &Session, proxy_log_path: &str) -> Option<String> {
  let out = session
    .execute(&format!("tail -n 200 {} 2>/dev/null", command::quote(proxy_log_path)))
    .await;

  let out = match out {
    Ok(out) => out,
    Err(e) => {
      warn!("failed to tail proxy log while waiting for SSL: {e:#}");
      return None;
    }
  };

  out
    .stdout
    .lines()
    .find(|line| FAILURE_SUBSTRINGS.iter().any(|needle| line.to_lowercase().contains(needle)))
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn healthy_requires_task_running_and_either_unproxied_or_reachable() {
    let mut health = ServiceHealth { task_running: true, proxy_enabled: false, ..Default::default() };
    assert!(health.is_healthy());

    health.proxy_enabled = true;
    assert!(!health.is_healthy());

    health.http_reachable = true;
    assert!(health.is_healthy());
  }

  #[test]
  fn task_not_running_is_never_healthy() {
    let health = ServiceHealth { task_running: false, proxy_enabled: false, http_reachable: true, ..Default::default() };
    assert!(!health.is_healthy());
  }

  #[test]
  fn tail_proxy_log_recognizes_known_failure_substrings() {
    assert!(FAILURE_SUBSTRINGS.iter().any(|s| "2024 acme: error: 400 urn:ietf:params:acme:error:dns".to_lowercase().contains(s)));
  }
}
