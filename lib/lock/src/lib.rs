//! Cross-process exclusive lock over a project's `.tako/.lock` file.
//!
//! Two tako invocations against the same project must never run a
//! deploy/rollback/destroy at once — the state store has no
//! transactional guarantees of its own, it just writes atomically. This
//! crate is the thing that actually serializes them, using `fs4`'s
//! advisory `flock`-family locking so it works whether or not the two
//! processes are on cooperating code (and across restarts, since the
//! lock is held by the OS, not a Rust-level guard living only in one
//! process's memory).

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use fs4::tokio::AsyncFileExt;
use model::{LockInfo, TakoError, tako_timestamp};
use tokio::fs::{File, OpenOptions};
use tracing::{debug, warn};

/// A lock is considered abandoned — its holder process almost
/// certainly crashed or was killed — once it's older than this.
pub const STALE_LOCK_THRESHOLD: Duration = Duration::from_secs(30 * 60);

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_WAIT: Duration = Duration::from_secs(5 * 60);

/// Held for the duration of one lock-requiring operation. Dropping it
/// releases the underlying OS lock; the lock file itself is left behind
/// (harmless — the next acquire just re-locks it) unless [`LockGuard::release`]
/// is called explicitly.
pub struct LockGuard {
  file: Option<File>,
  path: PathBuf,
}

/// Acquires the lock immediately, failing with [`TakoError::LockContention`]
/// if it's currently held by a non-stale holder. A stale holder (older
/// than [`STALE_LOCK_THRESHOLD`]) is recovered automatically: its lock
/// info is overwritten and the acquire proceeds.
pub async fn acquire(
  lock_path: impl Into<PathBuf>,
  operation: &str,
) -> Result<LockGuard> {
  let lock_path = lock_path.into();
  if let Some(parent) = lock_path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }

  let file = OpenOptions::new()
    .create(true)
    .truncate(false)
    .read(true)
    .write(true)
    .open(&lock_path)
    .await
    .with_context(|| format!("failed to open {}", lock_path.display()))?;

  match file.try_lock_exclusive() {
    Ok(true) => {
      write_holder_info(&file, operation).await?;
      debug!("acquired lock for '{operation}'");
      return Ok(LockGuard { file: Some(file), path: lock_path });
    }
    Ok(false) => {}
    Err(e) => return Err(e).context("failed to try-lock lock file"),
  }

  // Someone else holds the OS lock. See if they've gone stale.
  let holder = read_holder_info(&lock_path).await?;
  let age_secs = (tako_timestamp() - holder.created_at).max(0) as u64;

  if age_secs < STALE_LOCK_THRESHOLD.as_secs() {
    return Err(
      TakoError::LockContention {
        holder: holder.who,
        operation: holder.operation,
        age_secs,
      }
      .into(),
    );
  }

  warn!(
    "lock held by '{}' (operation '{}') is {age_secs}s old, exceeding the \
     {}s staleness threshold — recovering",
    holder.who,
    holder.operation,
    STALE_LOCK_THRESHOLD.as_secs()
  );

  // The original holder's process is gone (or it'd still hold the OS
  // lock), so the `flock` itself is already free; we just never
  // observed that because the stat race above ran before the OS
  // noticed the holder's exit. Re-attempt the lock now.
  file
    .try_lock_exclusive()
    .context("failed to try-lock lock file")?
    .then_some(())
    .ok_or_else(|| anyhow!("stale lock recovery raced with a live holder"))?;

  write_holder_info(&file, operation).await?;
  Ok(LockGuard { file: Some(file), path: lock_path })
}

/// Like [`acquire`], but polls every second instead of failing
/// immediately, up to [`MAX_WAIT`].
pub async fn acquire_with_wait(
  lock_path: impl Into<PathBuf>,
  operation: &str,
) -> Result<LockGuard> {
  let lock_path = lock_path.into();
  let deadline = tokio::time::Instant::now() + MAX_WAIT;

  loop {
    match acquire(lock_path.clone(), operation).await {
      Ok(guard) => return Ok(guard),
      Err(e) => {
        let is_contention =
          model::find_tako_error(&e).is_some_and(|e| {
            matches!(e, TakoError::LockContention { .. })
          });
        if !is_contention || tokio::time::Instant::now() >= deadline {
          return Err(e);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
      }
    }
  }
}

impl LockGuard {
  /// Releases the lock and deletes the lock file.
  pub async fn release(mut self) -> Result<()> {
    if let Some(file) = self.file.take() {
      file.unlock().context("failed to unlock")?;
    }
    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e).context("failed to remove lock file"),
    }
  }
}

impl Drop for LockGuard {
  fn drop(&mut self) {
    if let Some(file) = self.file.take() {
      let _ = file.unlock();
    }
  }
}

async fn write_holder_info(file: &File, operation: &str) -> Result<()> {
  let who = format!(
    "{}@{}",
    std::env::var("USER").unwrap_or_else(|_| "unknown".into()),
    hostname()
  );
  let info = LockInfo {
    id: uuid::Uuid::new_v4().to_string(),
    operation: operation.to_string(),
    who,
    created_at: tako_timestamp(),
    pid: std::process::id(),
  };
  let json =
    serde_json::to_vec_pretty(&info).context("failed to serialize lock info")?;

  // The exclusive lock is already held, so this overwrite can't race
  // with another holder's write.
  use tokio::io::{AsyncSeekExt, AsyncWriteExt};
  let mut file = file.try_clone().await.context("failed to clone lock fd")?;
  file.set_len(0).await.context("failed to truncate lock file")?;
  file.seek(std::io::SeekFrom::Start(0)).await?;
  file.write_all(&json).await.context("failed to write lock info")?;
  file.sync_all().await.ok();
  Ok(())
}

async fn read_holder_info(path: &PathBuf) -> Result<LockInfo> {
  let bytes = tokio::fs::read(path)
    .await
    .with_context(|| format!("failed to read {}", path.display()))?;
  serde_json::from_slice(&bytes).context("failed to parse lock holder info")
}

fn hostname() -> String {
  std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".into())
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[tokio::test]
  async fn acquire_then_release_allows_reacquire() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".lock");

    let guard = acquire(&path, "deploy").await.unwrap();
    guard.release().await.unwrap();

    acquire(&path, "deploy").await.unwrap();
  }

  #[tokio::test]
  async fn second_acquire_fails_with_contention() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".lock");

    let _held = acquire(&path, "deploy").await.unwrap();
    let err = acquire(&path, "plan").await.unwrap_err();
    assert!(
      model::find_tako_error(&err)
        .is_some_and(|e| matches!(e, TakoError::LockContention { .. }))
    );
  }
}
