//! Outbound notification dispatch (§6 `notifications{slack, discord,
//! webhook}`). Deliberately thin: one event type, one `send` call per
//! configured channel. Deep per-channel formatting is out of scope; the
//! one rule that is in scope is that every outbound body is redacted
//! before it's serialized, so a delivery failure can never leak a secret
//! into a log line or a third-party inbox.

use model::{DeploymentRecord, DeploymentStatus, NotificationsConfig};
use redact::Redactor;
use serde::Serialize;
use tracing::warn;

/// Something worth telling an operator about. Each variant renders to a
/// short human sentence via [`Event::summary`]; channel-specific payload
/// shape lives in this module rather than in the callers.
#[derive(Debug, Clone)]
pub enum Event<'a> {
  DeploymentCompleted(&'a DeploymentRecord),
  DriftDetected { environment: &'a str, item_count: usize },
  HealthDegraded { environment: &'a str, service: &'a str, detail: &'a str },
}

impl Event<'_> {
  pub fn summary(&self) -> String {
    match self {
      Event::DeploymentCompleted(record) => {
        let verdict = match record.status {
          DeploymentStatus::Success => "succeeded",
          DeploymentStatus::Partial => "partially succeeded",
          DeploymentStatus::Failed => "failed",
        };
        format!(
          "deployment {} to '{}' {verdict} ({}/{} services ok)",
          record.deployment_id,
          record.environment,
          record.services.iter().filter(|s| s.success).count(),
          record.services.len(),
        )
      }
      Event::DriftDetected { environment, item_count } => {
        format!("drift detected in '{environment}': {item_count} item(s) diverge from the last deploy")
      }
      Event::HealthDegraded { environment, service, detail } => {
        format!("'{service}' in '{environment}' is unhealthy: {detail}")
      }
    }
  }
}

#[derive(Serialize)]
struct SlackPayload {
  text: String,
}

#[derive(Serialize)]
struct DiscordPayload {
  content: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
  event: &'a str,
  message: String,
}

/// Posts `event` to every channel configured in `config`. Each channel is
/// attempted independently — a failed Slack delivery does not prevent
/// the Discord or generic webhook deliveries from being attempted. All
/// failures are logged (redacted) and swallowed; notification delivery
/// never fails a deployment.
pub async fn send(config: &NotificationsConfig, redactor: &Redactor, event: &Event<'_>) {
  let message = redactor.redact(&event.summary());
  let client = reqwest::Client::new();

  if let Some(url) = &config.slack {
    post(&client, url, &SlackPayload { text: message.clone() }, redactor, "slack").await;
  }
  if let Some(url) = &config.discord {
    post(&client, url, &DiscordPayload { content: message.clone() }, redactor, "discord").await;
  }
  if let Some(url) = &config.webhook {
    let event_name = event_name(event);
    post(&client, url, &WebhookPayload { event: event_name, message: message.clone() }, redactor, "webhook").await;
  }
}

fn event_name(event: &Event<'_>) -> &'static str {
  match event {
    Event::DeploymentCompleted(_) => "deployment_completed",
    Event::DriftDetected { .. } => "drift_detected",
    Event::HealthDegraded { .. } => "health_degraded",
  }
}

async fn post(client: &reqwest::Client, url: &str, body: &impl Serialize, redactor: &Redactor, channel: &str) {
  let result = client.post(url).json(body).send().await;
  match result {
    Ok(response) if response.status().is_success() => {}
    Ok(response) => warn!("{channel} notification rejected: {}", redactor.redact(&response.status().to_string())),
    Err(e) => warn!("{channel} notification failed: {}", redactor.redact(&e.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use model::{DeploymentMode, ServiceDeploymentOutcome};

  use super::*;

  fn record(status: DeploymentStatus) -> DeploymentRecord {
    DeploymentRecord {
      deployment_id: "dep-1".into(),
      timestamp: 0,
      environment: "prod".into(),
      mode: DeploymentMode::Sequential,
      status,
      duration_ms: 10,
      services: vec![ServiceDeploymentOutcome { service: "web".into(), image: "web:1".into(), success: true, message: None }],
      network_info: None,
      volume_info: vec![],
      config_hash: "abc".into(),
      is_rollback_point: false,
      git_commit: None,
      triggered_by: "cli".into(),
    }
  }

  #[test]
  fn summary_mentions_service_ratio() {
    let rec = record(DeploymentStatus::Success);
    let summary = Event::DeploymentCompleted(&rec).summary();
    assert!(summary.contains("1/1"));
    assert!(summary.contains("succeeded"));
  }

  #[test]
  fn failed_status_renders_as_failed() {
    let rec = record(DeploymentStatus::Failed);
    let summary = Event::DeploymentCompleted(&rec).summary();
    assert!(summary.contains("failed"));
  }

  #[tokio::test]
  async fn send_with_no_channels_configured_is_a_no_op() {
    let config = NotificationsConfig::default();
    let redactor = Redactor::new();
    let rec = record(DeploymentStatus::Success);
    send(&config, &redactor, &Event::DeploymentCompleted(&rec)).await;
  }

  #[test]
  fn outbound_text_is_redacted_before_send() {
    let redactor = Redactor::new();
    redactor.register("sup3r-s3cret-value");
    let rec = record(DeploymentStatus::Success);
    let event = Event::HealthDegraded { environment: "prod", service: "web", detail: "sup3r-s3cret-value leaked in a header" };
    let _ = &rec;
    let message = redactor.redact(&event.summary());
    assert!(!message.contains("sup3r-s3cret-value"));
  }
}
