use clap::{Parser, Subcommand};

/// Declarative container-deployment orchestrator.
#[derive(Debug, Parser)]
#[command(name = "tako", version, about)]
pub struct Cli {
  /// Path to the configuration document (YAML or JSON). Falls back to
  /// `TAKO_CONFIG`, then `tako.yaml`/`tako.yml`/`tako.json` in the
  /// current directory.
  #[arg(long, global = true)]
  pub config: Option<String>,

  /// Which configured environment to operate on. Falls back to
  /// `TAKO_ENVIRONMENT`, then the sole environment if only one is
  /// declared.
  #[arg(long, global = true)]
  pub environment: Option<String>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Compute the plan against the live cluster but do not apply it.
  Plan,

  /// Acquire the lock, plan, and apply.
  Deploy {
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes: bool,
    /// Deploy independent services concurrently, bounded by
    /// `deployment.parallel.max_concurrent_deploys`.
    #[arg(long)]
    parallel: bool,
  },

  /// Re-applies a prior deployment record.
  Rollback {
    /// Deployment id to roll back to. Defaults to the last record
    /// flagged as a rollback point.
    #[arg(long)]
    to: Option<String>,
  },

  /// Removes every non-persistent service, the overlay network, and
  /// the project's state markers for the environment.
  Destroy,

  /// Shows the current deployment record for the environment.
  Status,

  /// Tails the recorded deploy log for one service.
  Logs {
    service: String,
  },

  /// Runs the health prober against every proxied service.
  Health,

  /// Computes and prints drift against the last applied configuration.
  Drift,

  /// Manages the project's secret files.
  Secrets {
    #[command(subcommand)]
    action: SecretsAction,
  },
}

#[derive(Debug, Subcommand)]
pub enum SecretsAction {
  /// Lists the raw (unexpanded) keys in a secrets file.
  List,
  /// Sets a key in a secrets file.
  Set { key: String, value: String },
  /// Removes a key from a secrets file.
  Delete { key: String },
  /// Resolves every layer and expansion, surfacing errors early.
  Validate,
}
