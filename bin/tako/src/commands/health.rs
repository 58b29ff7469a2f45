//! `tako health` (§6/§4.13): runs the health prober against every
//! service in the environment, printing per-service results and
//! notifying on any unhealthy proxied service.

use anyhow::{Context as _, Result};
use colored::Colorize;
use comfy_table::{Table, presets::UTF8_FULL};

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<bool> {
  let environment = ctx.environment();
  let project = &ctx.document.project.name;
  let manager = environment
    .designated_manager()
    .context("no member server configured for environment")?;
  let session = ctx.sessions.get(manager).await?;

  let mut table = Table::new();
  table.load_preset(UTF8_FULL);
  table.set_header(vec!["service", "task", "proxy", "http", "tls issuer", "healthy"]);

  let mut all_healthy = true;
  for (name, service) in &environment.services {
    let qualified = model::qualified_service_name(project, &environment.name, name);
    let domain = service.proxy.as_ref().map(|p| p.primary_domain.as_str());
    let result = health::check_service(&session, &qualified, domain).await;

    if !result.is_healthy() {
      all_healthy = false;
      let detail = if result.errors.is_empty() {
        "unhealthy".to_string()
      } else {
        result.errors.join("; ")
      };
      notify::send(
        &ctx.document.notifications,
        &ctx.redactor,
        &notify::Event::HealthDegraded { environment: &environment.name, service: name, detail: &detail },
      )
      .await;
    }

    let healthy = result.is_healthy();
    table.add_row(vec![
      name.clone(),
      bool_cell(result.task_running),
      bool_cell(result.proxy_enabled),
      result.http_status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
      result.tls.as_ref().map(|t| t.issuer_cn.clone()).unwrap_or_else(|| "-".to_string()),
      bool_cell(healthy),
    ]);
  }

  println!("{table}");
  Ok(all_healthy)
}

fn bool_cell(value: bool) -> String {
  if value { "yes".green().to_string() } else { "no".red().to_string() }
}
