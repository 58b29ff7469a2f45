//! File-backed persistence for everything tako remembers between runs:
//! the global cluster-init state, per-environment deployment history and
//! rollback candidates, per-service observed state, the build cache, and
//! the resource graph. Every write goes through
//! [`io::atomic_write_json`] — write to `.tmp`, then rename — so a
//! crash mid-write never corrupts state a concurrent reader might see.
//!
//! This is deliberately *not* a database: tako runs as a single process
//! against a project directory, and state lives alongside the project
//! under `<project>/.tako/` so `git status`/backups/inspection all work
//! with ordinary file tools.

mod build_cache;
mod crypto;
mod deployment;
mod io;
mod paths;
mod resources;

pub use build_cache::{BuildCache, BuildCacheEntry};
pub use deployment::DeploymentHistory;
pub use paths::StatePaths;
pub use resources::ResourceGraph;

use anyhow::{Context, Result};
use model::{ClusterState, ObservedService};
use tokio::sync::Mutex;

/// The single entry point into project state. Holds an in-process mutex
/// so concurrent tasks within one tako invocation (e.g. the executor
/// deploying several services in parallel) don't interleave writes to
/// the same file; cross-process exclusion is [`lock`]'s job, not this
/// crate's.
pub struct StateStore {
  paths: StatePaths,
  guard: Mutex<()>,
}

impl StateStore {
  pub fn new(project_root: impl AsRef<std::path::Path>) -> Self {
    Self { paths: StatePaths::new(project_root), guard: Mutex::new(()) }
  }

  pub fn paths(&self) -> &StatePaths {
    &self.paths
  }

  pub async fn load_cluster_state(&self) -> Result<ClusterState> {
    let _guard = self.guard.lock().await;
    let path = self.paths.global_state_file();
    let ciphertext = match tokio::fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(ClusterState::default());
      }
      Err(e) => {
        return Err(e)
          .with_context(|| format!("failed to read {}", path.display()));
      }
    };

    let cipher = crypto::ClusterStateCipher::load_or_create(&self.paths).await?;
    let plaintext = cipher.decrypt(&ciphertext)?;
    serde_json::from_slice(&plaintext).context("failed to parse cluster state")
  }

  pub async fn save_cluster_state(&self, state: &ClusterState) -> Result<()> {
    let _guard = self.guard.lock().await;
    let cipher = crypto::ClusterStateCipher::load_or_create(&self.paths).await?;
    let plaintext = serde_json::to_vec(state).context("failed to serialize cluster state")?;
    let ciphertext = cipher.encrypt(&plaintext);

    let path = self.paths.global_state_file();
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &ciphertext)
      .await
      .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, &path)
      .await
      .context("failed to persist cluster state")
  }

  pub fn deployment_history<'a>(
    &'a self,
    environment: &str,
  ) -> DeploymentHistory<'a> {
    DeploymentHistory::new(&self.paths, environment)
  }

  pub fn resources(&self) -> ResourceGraph<'_> {
    ResourceGraph::new(&self.paths)
  }

  pub fn build_cache(&self) -> BuildCache<'_> {
    BuildCache::new(&self.paths)
  }

  pub async fn load_service_state(
    &self,
    environment: &str,
    service: &str,
  ) -> Result<Option<ObservedService>> {
    io::read_json_opt(&self.paths.service_state_file(environment, service))
      .await
  }

  pub async fn save_service_state(
    &self,
    environment: &str,
    service: &ObservedService,
  ) -> Result<()> {
    let _guard = self.guard.lock().await;
    io::atomic_write_json(
      &self.paths.service_state_file(environment, &service.name),
      service,
    )
    .await
    .with_context(|| format!("failed to persist state for service '{}'", service.name))
  }

  /// Appends a line to the environment's deploy log — tailed by `tako
  /// logs` and grepped for diagnosing a failed deployment after the
  /// fact. Not atomic-rename-protected since it's append-only.
  pub async fn append_deploy_log(
    &self,
    environment: &str,
    line: &str,
  ) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let path = self.paths.deploy_log_file(environment);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .await
      .with_context(|| format!("failed to open deploy log {}", path.display()))?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[tokio::test]
  async fn cluster_state_defaults_when_missing() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let state = store.load_cluster_state().await.unwrap();
    assert!(!state.initialized);
  }

  #[tokio::test]
  async fn cluster_state_roundtrips() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    let mut state = store.load_cluster_state().await.unwrap();
    state.initialized = true;
    state.manager_host = Some("10.0.0.1".into());
    store.save_cluster_state(&state).await.unwrap();

    let reloaded = store.load_cluster_state().await.unwrap();
    assert!(reloaded.initialized);
    assert_eq!(reloaded.manager_host.as_deref(), Some("10.0.0.1"));
  }
}
