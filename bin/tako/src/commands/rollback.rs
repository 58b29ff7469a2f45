//! `tako rollback` (§6): re-applies a prior deployment record's service
//! configurations as a fresh plan, rather than replaying history
//! mechanically — the same executor path a normal deploy takes.

use anyhow::{Context as _, Result};
use model::{Change, DeploymentRecord, Environment, ImageSource, Plan};
use tracing::warn;

use crate::context::Context;

pub async fn run(ctx: &Context, to: Option<&str>) -> Result<DeploymentRecord> {
  let environment = ctx.environment();
  let project = &ctx.document.project.name;
  let history = ctx.state.deployment_history(&environment.name);

  let guard = lock::acquire_with_wait(ctx.state.paths().lock_file(), "rollback").await?;

  let result: Result<DeploymentRecord> = async {
    let target = match to {
      Some(id) => history
        .list_history()
        .await?
        .into_iter()
        .find(|r| r.deployment_id == id)
        .with_context(|| format!("no deployment record with id '{id}'"))?,
      None => history
        .rollback_candidate()
        .await?
        .context("no prior successful deployment to roll back to")?,
    };

    let plan = plan_from_record(project, environment, &target);
    println!("{}", planner::render(&plan));

    executor::apply(
      environment,
      project,
      &ctx.project_root,
      &plan,
      ctx.sessions.as_ref(),
      &ctx.state,
      &ctx.redactor,
      "cli-rollback",
    )
    .await
    .context("failed to apply rollback plan")
  }
  .await;

  guard.release().await.ok();
  result
}

/// Builds a plan that redeploys every successful service in `record`
/// using its *currently declared* configuration, with the image
/// reference pinned back to whatever that service ran at record time —
/// rollback restores the image that was known-good, through the
/// environment's present-day service definition (ports, env, mounts,
/// placement). A service the target record names but the current
/// configuration no longer declares can't be reconstructed from the
/// record alone, so it's skipped with a warning rather than guessed at.
fn plan_from_record(
  project: &str,
  environment: &Environment,
  record: &DeploymentRecord,
) -> Plan {
  let mut changes = Vec::new();
  for outcome in record.services.iter().filter(|o| o.success) {
    let Some(current) = environment.services.get(&outcome.service) else {
      warn!(
        "deployment record '{}' references service '{}', which is no longer declared; skipping",
        record.deployment_id, outcome.service
      );
      continue;
    };
    let mut pinned = current.clone();
    pinned.image = ImageSource::Image { image_reference: outcome.image.clone() };
    changes.push(Change::update(
      outcome.service.clone(),
      current.clone(),
      pinned,
      vec![format!("rolling back to deployment '{}'", record.deployment_id)],
    ));
  }
  Plan::new(project, environment.name.as_str(), changes)
}
