use anyhow::{Context, Result};
use model::DeploymentRecord;
use tracing::warn;

use crate::{StatePaths, io};

/// Per-environment deployment history: `current.json`, a `history/`
/// directory pruned to [`crate::paths::MAX_HISTORY_ENTRIES`] entries by
/// file mtime, and `rollback/last-stable.json` — the last record whose
/// deployment and health-check both succeeded.
pub struct DeploymentHistory<'a> {
  paths: &'a StatePaths,
  environment: String,
}

impl<'a> DeploymentHistory<'a> {
  pub fn new(paths: &'a StatePaths, environment: impl Into<String>) -> Self {
    Self { paths, environment: environment.into() }
  }

  pub async fn current(&self) -> Result<Option<DeploymentRecord>> {
    io::read_json_opt(&self.paths.current_deployment_file(&self.environment))
      .await
  }

  pub async fn rollback_candidate(&self) -> Result<Option<DeploymentRecord>> {
    io::read_json_opt(&self.paths.rollback_file(&self.environment)).await
  }

  /// Records `record` as the new current deployment, appends it to
  /// history, prunes history down to the configured cap, and — if the
  /// deployment fully succeeded — promotes it to the rollback candidate.
  pub async fn record(&self, record: &DeploymentRecord) -> Result<()> {
    io::atomic_write_json(
      &self.paths.current_deployment_file(&self.environment),
      record,
    )
    .await
    .context("failed to write current deployment record")?;

    let history_key = record.history_key();
    io::atomic_write_json(
      &self.paths.history_entry_file(&self.environment, &history_key),
      record,
    )
    .await
    .context("failed to write deployment history entry")?;

    self.prune_history().await?;

    if record.status == model::DeploymentStatus::Success {
      io::atomic_write_json(&self.paths.rollback_file(&self.environment), record)
        .await
        .context("failed to write rollback candidate")?;
    }

    Ok(())
  }

  /// Keeps the newest [`crate::paths::MAX_HISTORY_ENTRIES`] entries
  /// (by file modified time) and removes the rest.
  async fn prune_history(&self) -> Result<()> {
    let dir = self.paths.history_dir(&self.environment);
    let mut read_dir = match tokio::fs::read_dir(&dir).await {
      Ok(rd) => rd,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
      Err(e) => {
        return Err(e).with_context(|| {
          format!("failed to read history dir {}", dir.display())
        });
      }
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
      let metadata = entry.metadata().await?;
      if let Ok(modified) = metadata.modified() {
        entries.push((modified, entry.path()));
      }
    }

    if entries.len() <= crate::paths::MAX_HISTORY_ENTRIES {
      return Ok(());
    }

    entries.sort_by_key(|(modified, _)| *modified);
    let overflow = entries.len() - crate::paths::MAX_HISTORY_ENTRIES;
    for (_, path) in entries.into_iter().take(overflow) {
      if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("failed to prune history entry {}: {e:#}", path.display());
      }
    }

    Ok(())
  }

  pub async fn list_history(&self) -> Result<Vec<DeploymentRecord>> {
    let dir = self.paths.history_dir(&self.environment);
    let mut read_dir = match tokio::fs::read_dir(&dir).await {
      Ok(rd) => rd,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(Vec::new());
      }
      Err(e) => {
        return Err(e).with_context(|| {
          format!("failed to read history dir {}", dir.display())
        });
      }
    };

    let mut records = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
      if let Some(record) =
        io::read_json_opt::<DeploymentRecord>(&entry.path()).await?
      {
        records.push(record);
      }
    }
    records.sort_by_key(|r| r.timestamp);
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use model::{DeploymentMode, DeploymentStatus};
  use tempfile::tempdir;

  use super::*;

  fn sample_record(status: DeploymentStatus) -> DeploymentRecord {
    DeploymentRecord {
      deployment_id: "dep-1".into(),
      timestamp: model::tako_timestamp(),
      environment: "prod".into(),
      mode: DeploymentMode::Sequential,
      status,
      duration_ms: 1200,
      services: Vec::new(),
      network_info: None,
      volume_info: Vec::new(),
      config_hash: "deadbeef".into(),
      is_rollback_point: status == DeploymentStatus::Success,
      git_commit: None,
      triggered_by: "cli".into(),
    }
  }

  #[tokio::test]
  async fn record_promotes_succeeded_deploy_to_rollback_candidate() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let history = DeploymentHistory::new(&paths, "prod");

    history.record(&sample_record(DeploymentStatus::Success)).await.unwrap();

    let current = history.current().await.unwrap().unwrap();
    assert_eq!(current.status, DeploymentStatus::Success);

    let rollback = history.rollback_candidate().await.unwrap().unwrap();
    assert_eq!(rollback.deployment_id, "dep-1");
  }

  #[tokio::test]
  async fn record_does_not_promote_failed_deploy() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let history = DeploymentHistory::new(&paths, "prod");

    history.record(&sample_record(DeploymentStatus::Failed)).await.unwrap();

    assert!(history.rollback_candidate().await.unwrap().is_none());
  }
}
