//! `tako logs <service>` (§6): tails the service's container output —
//! `docker service logs` when the environment is clustered, `docker logs`
//! against the single host otherwise.

use anyhow::{Context as _, Result, bail};
use cluster::HostState;

use crate::context::Context;

const TAIL_LINES: &str = "200";

pub async fn run(ctx: &Context, service: &str) -> Result<()> {
  let environment = ctx.environment();
  if !environment.services.contains_key(service) {
    bail!("service '{service}' is not declared in environment '{}'", environment.name);
  }

  let manager = environment
    .designated_manager()
    .context("no member server configured for environment")?;
  let session = ctx.sessions.get(manager).await?;
  let qualified = model::qualified_service_name(&ctx.document.project.name, &environment.name, service);

  let command = match cluster::inspect(&session).await? {
    HostState::Member { .. } => {
      format!("docker service logs --tail {TAIL_LINES} --timestamps {}", command::quote(&qualified))
    }
    HostState::NotClustered => {
      format!("docker logs --tail {TAIL_LINES} --timestamps {}", command::quote(&qualified))
    }
  };

  let output = session.execute(&command).await.context("failed to fetch logs")?;
  print!("{}", ctx.redactor.redact(&output.stdout));
  if !output.stderr.is_empty() {
    eprint!("{}", ctx.redactor.redact(&output.stderr));
  }
  Ok(())
}
