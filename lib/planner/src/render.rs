use colored::Colorize;
use comfy_table::{Table, presets::UTF8_FULL};
use model::{ChangeType, Plan};

/// Renders `plan` as a summary table followed by a details section per
/// change kind, the shape a `tako plan`/`tako deploy` confirmation prompt
/// prints to the terminal.
pub fn render(plan: &Plan) -> String {
  let mut out = String::new();
  out.push_str(&render_summary_table(plan));
  out.push('\n');

  if plan.summary.adds > 0 {
    out.push_str(&format!("\n{}\n", "Additions:".green().bold()));
    for change in plan.adds() {
      out.push_str(&format!("  + {}\n", change.service));
    }
  }

  if plan.summary.updates > 0 {
    out.push_str(&format!("\n{}\n", "Updates:".yellow().bold()));
    for change in plan.updates() {
      out.push_str(&format!("  ~ {}\n", change.service));
      for reason in &change.reasons {
        out.push_str(&format!("      - {reason}\n"));
      }
    }
  }

  if plan.summary.removes > 0 {
    out.push_str(&format!("\n{}\n", "Removals:".red().bold()));
    for change in plan.removes() {
      let reason = change.reasons.first().map(String::as_str).unwrap_or("");
      out.push_str(&format!("  - {} ({reason})\n", change.service));
    }
  }

  if plan.has_destructive_changes() {
    out.push_str(&format!(
      "\n{}\n",
      "This plan includes destructive changes.".red().bold()
    ));
  }

  out
}

fn render_summary_table(plan: &Plan) -> String {
  let mut table = Table::new();
  table.load_preset(UTF8_FULL);
  table.set_header(vec!["service", "change"]);

  for change in &plan.changes {
    let label = match change.change_type {
      ChangeType::Add => "add".green().to_string(),
      ChangeType::Update => "update".yellow().to_string(),
      ChangeType::Remove => "remove".red().to_string(),
      ChangeType::NoOp => "no-op".dimmed().to_string(),
    };
    table.add_row(vec![change.service.clone(), label]);
  }

  format!(
    "{table}\n{total} total, {adds} to add, {updates} to update, {removes} to remove, {no_ops} unchanged",
    total = plan.summary.total,
    adds = plan.summary.adds,
    updates = plan.summary.updates,
    removes = plan.summary.removes,
    no_ops = plan.summary.no_ops,
  )
}
