//! Everything a command handler needs, assembled once in `main` after
//! the configuration document is loaded and the environment is selected.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use model::{ConfigDocument, Environment, TakoError};
use redact::Redactor;
use state::StateStore;
use transport::SessionPool;

pub struct Context {
  pub project_root: PathBuf,
  pub document: ConfigDocument,
  pub environment_name: String,
  pub sessions: Arc<SessionPool>,
  pub state: Arc<StateStore>,
  pub redactor: Arc<Redactor>,
}

impl Context {
  pub fn environment(&self) -> &Environment {
    // `select_environment` already verified this key exists; indexing
    // here instead of re-checking keeps every later call site infallible.
    &self.document.environments[&self.environment_name]
  }
}

/// Picks the environment to operate on: the CLI flag, else `TAKO_ENVIRONMENT`,
/// else the sole declared environment, else a configuration error.
pub fn select_environment(
  document: &ConfigDocument,
  cli_flag: Option<&str>,
) -> Result<String> {
  if let Some(name) = cli_flag {
    ensure_declared(document, name)?;
    return Ok(name.to_string());
  }
  if let Ok(name) = std::env::var("TAKO_ENVIRONMENT") {
    ensure_declared(document, &name)?;
    return Ok(name);
  }
  if document.environments.len() == 1 {
    return Ok(document.environments.keys().next().unwrap().clone());
  }
  Err(
    TakoError::Configuration(format!(
      "multiple environments declared ({:?}): pass --environment or set TAKO_ENVIRONMENT",
      document.environments.keys().collect::<Vec<_>>()
    ))
    .into(),
  )
}

fn ensure_declared(document: &ConfigDocument, name: &str) -> Result<()> {
  if document.environments.contains_key(name) {
    Ok(())
  } else {
    Err(
      TakoError::Configuration(format!(
        "environment '{name}' is not declared in the configuration document"
      ))
      .into(),
    )
  }
}

impl Context {
  /// Registers every secret value and anything that looks like one
  /// (`redact::is_sensitive_name`) from the environment's services so
  /// command output never leaks them, then builds the rest of the
  /// context.
  pub async fn build(
    project_root: PathBuf,
    document: ConfigDocument,
    environment_name: String,
  ) -> Result<Self> {
    let redactor = Arc::new(Redactor::new());

    let resolved = secrets::load_resolved(&project_root, &environment_name)
      .await
      .context("failed to resolve secrets")?;
    for (name, value) in &resolved {
      if redact::is_sensitive_name(name) {
        redactor.register(value);
      }
    }
    {
      let environment = &document.environments[&environment_name];
      for service in environment.services.values() {
        for value in service.env_map.values() {
          redactor.register(value);
        }
      }
    }

    let state = Arc::new(StateStore::new(project_root.clone()));

    Ok(Self {
      project_root,
      document,
      environment_name,
      sessions: Arc::new(SessionPool::new()),
      state,
      redactor,
    })
  }
}
