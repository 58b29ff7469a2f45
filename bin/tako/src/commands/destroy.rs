//! `tako destroy` (§6): removes every non-persistent service in the
//! environment, the overlay network, and the environment's state
//! markers. Persistent services and their volumes are left in place —
//! the same rule the planner already applies to an observed-only service.

use anyhow::{Context as _, Result};
use indexmap::IndexMap;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<model::Plan> {
  let environment = ctx.environment();
  let project = &ctx.document.project.name;

  let guard = lock::acquire_with_wait(ctx.state.paths().lock_file(), "destroy").await?;

  let result: Result<model::Plan> = async {
    let observed = super::observe_current(ctx).await?;
    // An empty desired map makes every currently-declared service look
    // unwanted; the planner's own persistence rule keeps persistent
    // services as no-ops rather than removals.
    let plan = planner::build_plan(project, &environment.name, &IndexMap::new(), &observed);

    println!("{}", planner::render(&plan));

    executor::apply(
      environment,
      project,
      &ctx.project_root,
      &plan,
      ctx.sessions.as_ref(),
      &ctx.state,
      &ctx.redactor,
      "cli-destroy",
    )
    .await
    .context("failed to remove services")?;

    let manager = environment
      .designated_manager()
      .context("no member server configured for environment")?;
    let session = ctx.sessions.get(manager).await?;
    cluster::remove_network(&session, project, &environment.name)
      .await
      .context("failed to remove overlay network")?;

    remove_state_markers(ctx, &environment.name).await?;

    Ok(plan)
  }
  .await;

  guard.release().await.ok();
  result
}

async fn remove_state_markers(ctx: &Context, environment: &str) -> Result<()> {
  let dir = ctx.state.paths().environment_dir(environment);
  match tokio::fs::remove_dir_all(&dir).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e).with_context(|| format!("failed to remove {}", dir.display())),
  }
}
