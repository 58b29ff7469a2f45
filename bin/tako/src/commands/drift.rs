//! `tako drift` (§6/§4.9 drift variant): computes per-field drift between
//! the last deployed configuration and the live cluster, without
//! proposing any change.

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Table, presets::UTF8_FULL};
use model::DriftSeverity;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<usize> {
  let environment = ctx.environment();
  let project = &ctx.document.project.name;
  let observed = super::observe_current(ctx).await?;

  let mut items = Vec::new();
  for (name, service) in &environment.services {
    let Some(observed_service) = observed.get(name) else { continue };
    let qualified = model::qualified_service_name(project, &environment.name, name);
    items.extend(drift::compare_service(&qualified, service, observed_service));
  }

  if items.is_empty() {
    println!("no drift detected in environment '{}'", environment.name);
    return Ok(0);
  }

  let mut table = Table::new();
  table.load_preset(UTF8_FULL);
  table.set_header(vec!["service", "field", "kind", "severity", "detail"]);
  for item in &items {
    let severity = match item.severity {
      DriftSeverity::Low => "low".to_string(),
      DriftSeverity::Medium => "medium".yellow().to_string(),
      DriftSeverity::High => "high".red().to_string(),
      DriftSeverity::Critical => "critical".red().bold().to_string(),
    };
    table.add_row(vec![
      item.service.clone(),
      item.field.clone(),
      format!("{:?}", item.kind).to_lowercase(),
      severity,
      item.detail.clone(),
    ]);
  }
  println!("{table}");

  notify::send(
    &ctx.document.notifications,
    &ctx.redactor,
    &notify::Event::DriftDetected { environment: &environment.name, item_count: items.len() },
  )
  .await;

  Ok(items.len())
}
