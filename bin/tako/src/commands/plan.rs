//! `tako plan` (§6): exit 0 with no changes, 2 with changes pending, 1 on
//! error. Never touches the lock — a plan never mutates anything.

use anyhow::Result;

use crate::context::Context;

pub enum Outcome {
  NoChanges,
  ChangesPending,
}

pub async fn run(ctx: &Context) -> Result<Outcome> {
  let observed = super::observe_current(ctx).await?;
  let plan = super::build_plan(ctx, &observed);

  println!("{}", planner::render(&plan));

  if plan.has_changes() {
    Ok(Outcome::ChangesPending)
  } else {
    Ok(Outcome::NoChanges)
  }
}
