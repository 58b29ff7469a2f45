mod cli;
mod commands;
mod config;
mod context;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, SecretsAction};
use context::Context;
use logger::{LogConfig, LogLevel, StdioLogMode};

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();

  let log_config = LogConfig {
    level: std::env::var("TAKO_LOG_LEVEL")
      .ok()
      .and_then(|v| match v.to_ascii_uppercase().as_str() {
        "ERROR" => Some(LogLevel::Error),
        "WARN" => Some(LogLevel::Warn),
        "INFO" => Some(LogLevel::Info),
        "DEBUG" => Some(LogLevel::Debug),
        "TRACE" => Some(LogLevel::Trace),
        _ => None,
      })
      .unwrap_or(LogLevel::Info),
    stdio: if std::env::var("TAKO_LOG_JSON").as_deref() == Ok("1") {
      StdioLogMode::Json
    } else {
      StdioLogMode::Standard
    },
    ..LogConfig::default()
  };
  if let Err(e) = logger::init(&log_config) {
    eprintln!("failed to initialize logging: {e:#}");
  }

  match run(cli).await {
    Ok(code) => code,
    Err(e) => {
      eprintln!("error: {e:#}");
      let code = model::find_tako_error(&e).map(|k| k.exit_code()).unwrap_or(1);
      ExitCode::from(code as u8)
    }
  }
}

async fn run(cli: Cli) -> Result<ExitCode> {
  let project_root = std::env::current_dir()?;
  let config_path = config::resolve_config_path(cli.config.as_deref(), &project_root)?;
  let document = config::load(&config_path).await?;

  let environment_name = context::select_environment(&document, cli.environment.as_deref())?;
  let ctx = Context::build(project_root, document, environment_name).await?;

  match cli.command {
    Command::Plan => match commands::plan::run(&ctx).await? {
      commands::plan::Outcome::NoChanges => Ok(ExitCode::from(0)),
      commands::plan::Outcome::ChangesPending => Ok(ExitCode::from(2)),
    },

    Command::Deploy { yes, parallel } => {
      let record = commands::deploy::run(&ctx, yes, parallel).await?;
      match record.status {
        model::DeploymentStatus::Success => Ok(ExitCode::from(0)),
        _ => Ok(ExitCode::from(1)),
      }
    }

    Command::Rollback { to } => {
      commands::rollback::run(&ctx, to.as_deref()).await?;
      Ok(ExitCode::from(0))
    }

    Command::Destroy => {
      commands::destroy::run(&ctx).await?;
      Ok(ExitCode::from(0))
    }

    Command::Status => {
      commands::status::run(&ctx).await?;
      Ok(ExitCode::from(0))
    }

    Command::Logs { service } => {
      commands::logs::run(&ctx, &service).await?;
      Ok(ExitCode::from(0))
    }

    Command::Health => {
      let healthy = commands::health::run(&ctx).await?;
      Ok(ExitCode::from(if healthy { 0 } else { 1 }))
    }

    Command::Drift => {
      let item_count = commands::drift::run(&ctx).await?;
      Ok(ExitCode::from(if item_count == 0 { 0 } else { 1 }))
    }

    Command::Secrets { action } => {
      match action {
        SecretsAction::List => commands::secrets::list(&ctx).await?,
        SecretsAction::Set { key, value } => commands::secrets::set(&ctx, &key, &value).await?,
        SecretsAction::Delete { key } => commands::secrets::delete(&ctx, &key).await?,
        SecretsAction::Validate => commands::secrets::validate(&ctx).await?,
      }
      Ok(ExitCode::from(0))
    }
  }
}
