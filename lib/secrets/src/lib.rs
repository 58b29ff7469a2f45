//! Secret loading, layered scoping, variable expansion, and
//! materialization to the throwaway env-files `docker service create`
//! reads from.
//!
//! Secrets live in plain `KEY=value` files under `<project>/.tako/`:
//! `secrets` (applies to every environment) overlaid by
//! `secrets.<environment>` (environment-specific values win). Nothing
//! in this crate encrypts these files at rest — they're meant to be
//! `.gitignore`d and live only on the machine tako runs from; secret
//! *managers* integrate through the `$(op ...)`-style command
//! substitution in [`expand`], not through a built-in vault.

mod dotenv;
mod expand;

pub use expand::ALLOWED_SUBSTITUTION_COMMANDS;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::debug;

/// Loads and layers the base and per-environment secret files for
/// `project_root`, then expands variable references and command
/// substitutions. Returns the fully-resolved `KEY=value` map.
pub async fn load_resolved(
  project_root: &Path,
  environment: &str,
) -> Result<IndexMap<String, String>> {
  let mut vars = load_file(&project_root.join(".tako/secrets")).await?;
  let overlay =
    load_file(&project_root.join(format!(".tako/secrets.{environment}")))
      .await?;
  for (key, value) in overlay {
    vars.insert(key, value);
  }

  expand::expand_all(&vars)
    .await
    .context("failed to expand secret values")
}

/// The raw (unexpanded) secrets file for `environment`, or the shared
/// base file when `environment` is `None` — the file `tako secrets
/// {list,set,delete}` operates on.
pub fn secrets_file_path(project_root: &Path, environment: Option<&str>) -> PathBuf {
  match environment {
    Some(env) => project_root.join(format!(".tako/secrets.{env}")),
    None => project_root.join(".tako/secrets"),
  }
}

/// Lists the raw `KEY=value` pairs in one secrets file, unexpanded —
/// `${NAME}` references and command substitutions are shown verbatim
/// rather than resolved, since that's what an operator editing the file
/// needs to see.
pub async fn list_raw(project_root: &Path, environment: Option<&str>) -> Result<IndexMap<String, String>> {
  load_file(&secrets_file_path(project_root, environment)).await
}

/// Sets `key` to `value` in one secrets file, creating it (mode 0600,
/// parent directory mode 0700) if it doesn't exist yet.
pub async fn set(project_root: &Path, environment: Option<&str>, key: &str, value: &str) -> Result<()> {
  let path = secrets_file_path(project_root, environment);
  let mut vars = load_file(&path).await?;
  vars.insert(key.to_string(), value.to_string());
  write_file(&path, &vars).await
}

/// Removes `key` from one secrets file. A no-op if the key (or the
/// file) doesn't exist.
pub async fn delete(project_root: &Path, environment: Option<&str>, key: &str) -> Result<()> {
  let path = secrets_file_path(project_root, environment);
  let mut vars = load_file(&path).await?;
  if vars.shift_remove(key).is_none() {
    return Ok(());
  }
  write_file(&path, &vars).await
}

/// Validates that every secret referenced by the layered, expanded view
/// of `environment`'s secrets resolves cleanly — missing variables,
/// disallowed command substitutions, and expansion failures all surface
/// here rather than deep inside a deploy.
pub async fn validate(project_root: &Path, environment: &str) -> Result<IndexMap<String, String>> {
  load_resolved(project_root, environment).await
}

async fn write_file(path: &Path, vars: &IndexMap<String, String>) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.with_context(|| format!("failed to create {}", parent.display()))?;
    set_directory_owner_only_permissions(parent).await?;
  }
  tokio::fs::write(path, dotenv::serialize(vars))
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  set_owner_only_permissions(path).await
}

#[cfg(unix)]
async fn set_directory_owner_only_permissions(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
    .await
    .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
async fn set_directory_owner_only_permissions(_path: &Path) -> Result<()> {
  Ok(())
}

async fn load_file(path: &Path) -> Result<IndexMap<String, String>> {
  match tokio::fs::read_to_string(path).await {
    Ok(content) => Ok(dotenv::parse(&content)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      Ok(IndexMap::new())
    }
    Err(e) => {
      Err(e).with_context(|| format!("failed to read {}", path.display()))
    }
  }
}

/// A materialized env-file on disk, deleted when dropped (best-effort —
/// see [`Self::cleanup`] for the awaited version callers should prefer).
pub struct MaterializedEnvFile {
  path: PathBuf,
}

impl MaterializedEnvFile {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Removes the file. Prefer this over relying on `Drop` so cleanup
  /// failures are observable.
  pub async fn cleanup(mut self) -> Result<()> {
    self.remove().await
  }

  async fn remove(&mut self) -> Result<()> {
    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e).with_context(|| {
        format!("failed to remove env file {}", self.path.display())
      }),
    }
  }
}

impl Drop for MaterializedEnvFile {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
  }
}

/// Writes `vars` to a mode-`0600` file at
/// `/tmp/tako-{project}-{service}-{id}.env`, for a `docker service
/// create --env-file` invocation to read. The returned handle deletes
/// the file when it's dropped or explicitly [`MaterializedEnvFile::cleanup`]'d
/// — it should never outlive the single command it's produced for.
pub async fn materialize_env_file(
  project: &str,
  service: &str,
  vars: &IndexMap<String, String>,
) -> Result<MaterializedEnvFile> {
  let id = uuid::Uuid::new_v4().simple().to_string();
  let path =
    std::env::temp_dir().join(format!("tako-{project}-{service}-{id}.env"));

  let content = dotenv::serialize(vars);
  tokio::fs::write(&path, content)
    .await
    .with_context(|| format!("failed to write env file {}", path.display()))?;
  set_owner_only_permissions(&path).await?;

  debug!("materialized env file for '{service}' at {}", path.display());
  Ok(MaterializedEnvFile { path })
}

#[cfg(unix)]
async fn set_owner_only_permissions(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    .await
    .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
async fn set_owner_only_permissions(_path: &Path) -> Result<()> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[tokio::test]
  async fn layers_base_and_environment_files_with_environment_winning() {
    let dir = tempdir().unwrap();
    tokio::fs::create_dir_all(dir.path().join(".tako")).await.unwrap();
    tokio::fs::write(dir.path().join(".tako/secrets"), "SHARED=base\nONLY_BASE=1\n")
      .await
      .unwrap();
    tokio::fs::write(
      dir.path().join(".tako/secrets.prod"),
      "SHARED=prod-override\n",
    )
    .await
    .unwrap();

    let resolved = load_resolved(dir.path(), "prod").await.unwrap();
    assert_eq!(resolved.get("SHARED").unwrap(), "prod-override");
    assert_eq!(resolved.get("ONLY_BASE").unwrap(), "1");
  }

  #[tokio::test]
  async fn missing_files_resolve_to_empty_map() {
    let dir = tempdir().unwrap();
    let resolved = load_resolved(dir.path(), "prod").await.unwrap();
    assert!(resolved.is_empty());
  }

  #[tokio::test]
  async fn materialized_env_file_is_removed_on_cleanup() {
    let mut vars = IndexMap::new();
    vars.insert("FOO".to_string(), "bar".to_string());

    let file = materialize_env_file("acme", "web", &vars).await.unwrap();
    let path = file.path().to_path_buf();
    assert!(path.exists());

    file.cleanup().await.unwrap();
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn set_then_list_roundtrips() {
    let dir = tempdir().unwrap();
    set(dir.path(), Some("prod"), "API_KEY", "abc123").await.unwrap();
    let listed = list_raw(dir.path(), Some("prod")).await.unwrap();
    assert_eq!(listed.get("API_KEY").unwrap(), "abc123");
  }

  #[tokio::test]
  async fn delete_removes_key_and_is_idempotent() {
    let dir = tempdir().unwrap();
    set(dir.path(), None, "FOO", "bar").await.unwrap();
    delete(dir.path(), None, "FOO").await.unwrap();
    assert!(list_raw(dir.path(), None).await.unwrap().is_empty());
    delete(dir.path(), None, "FOO").await.unwrap();
  }

  #[tokio::test]
  async fn base_and_environment_files_are_independent() {
    let dir = tempdir().unwrap();
    set(dir.path(), None, "SHARED", "base").await.unwrap();
    set(dir.path(), Some("prod"), "SHARED", "prod-only").await.unwrap();
    assert_eq!(list_raw(dir.path(), None).await.unwrap().get("SHARED").unwrap(), "base");
    assert_eq!(list_raw(dir.path(), Some("prod")).await.unwrap().get("SHARED").unwrap(), "prod-only");
  }
}
