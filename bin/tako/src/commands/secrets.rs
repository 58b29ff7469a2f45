//! `tako secrets {list,set,delete,validate}` (§6): raw CRUD over the
//! project's secrets files, plus a validate subcommand that forces full
//! resolution so a broken reference surfaces before a deploy hits it.

use anyhow::Result;

use crate::context::Context;

pub async fn list(ctx: &Context) -> Result<()> {
  // Deliberately unredacted: this is the one command whose entire job is
  // showing an operator what's actually stored, same as `cat .tako/secrets`.
  let vars = secrets::list_raw(&ctx.project_root, Some(&ctx.environment_name)).await?;
  for (key, value) in &vars {
    println!("{key}={value}");
  }
  Ok(())
}

pub async fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
  secrets::set(&ctx.project_root, Some(&ctx.environment_name), key, value).await?;
  println!("set '{key}' in environment '{}'", ctx.environment_name);
  Ok(())
}

pub async fn delete(ctx: &Context, key: &str) -> Result<()> {
  secrets::delete(&ctx.project_root, Some(&ctx.environment_name), key).await?;
  println!("removed '{key}' from environment '{}'", ctx.environment_name);
  Ok(())
}

pub async fn validate(ctx: &Context) -> Result<()> {
  let resolved = secrets::validate(&ctx.project_root, &ctx.environment_name).await?;
  println!("{} secret(s) resolved cleanly for environment '{}'", resolved.len(), ctx.environment_name);
  Ok(())
}
