pub mod deploy;
pub mod destroy;
pub mod drift;
pub mod health;
pub mod logs;
pub mod plan;
pub mod rollback;
pub mod secrets;
pub mod status;

use anyhow::Result;
use indexmap::IndexMap;
use model::ObservedService;

use crate::context::Context;

/// Opens (or reuses) the session to the environment's designated manager
/// and observes its current state — the starting point for `plan`,
/// `deploy`, `status`, `drift`, and `health`.
pub async fn observe_current(
  ctx: &Context,
) -> Result<IndexMap<String, ObservedService>> {
  let environment = ctx.environment();
  let manager = environment
    .designated_manager()
    .ok_or_else(|| anyhow::anyhow!("no member server configured for environment '{}'", environment.name))?;
  let session = ctx.sessions.get(manager).await?;
  observer::observe(&session, &ctx.document.project.name, &environment.name, &ctx.state).await
}

pub fn build_plan(ctx: &Context, observed: &IndexMap<String, ObservedService>) -> model::Plan {
  let environment = ctx.environment();
  planner::build_plan(&ctx.document.project.name, &environment.name, &environment.services, observed)
}
