//! `tako status` (§6): the current deployment record for the selected
//! environment, rendered as a table.

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Table, presets::UTF8_FULL};
use model::DeploymentStatus;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<()> {
  let environment = ctx.environment();
  let history = ctx.state.deployment_history(&environment.name);

  let Some(record) = history.current().await? else {
    println!("no deployment recorded for environment '{}'", environment.name);
    return Ok(());
  };

  let verdict = match record.status {
    DeploymentStatus::Success => "success".green().to_string(),
    DeploymentStatus::Partial => "partial".yellow().to_string(),
    DeploymentStatus::Failed => "failed".red().to_string(),
  };
  println!(
    "deployment {} on '{}' — {} ({}ms, triggered by {})",
    record.deployment_id, record.environment, verdict, record.duration_ms, record.triggered_by
  );

  let mut table = Table::new();
  table.load_preset(UTF8_FULL);
  table.set_header(vec!["service", "image", "result"]);
  for outcome in &record.services {
    let result = if outcome.success {
      "ok".green().to_string()
    } else {
      outcome.message.clone().unwrap_or_else(|| "failed".to_string()).red().to_string()
    };
    table.add_row(vec![outcome.service.clone(), outcome.image.clone(), result]);
  }
  println!("{table}");

  Ok(())
}
