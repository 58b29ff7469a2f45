use std::path::Path;

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};

/// Writes `value` to `path` as pretty JSON, via write-to-`.tmp`-then-rename
/// so a reader (or a crash mid-write) never observes a partial file.
/// Creates the parent directory if needed.
pub async fn atomic_write_json<T: Serialize + Sync>(
  path: &Path,
  value: &T,
) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create dir {}", parent.display()))?;
  }

  let tmp_path = path.with_extension("tmp");
  let data = serde_json::to_vec_pretty(value)
    .context("failed to serialize state to JSON")?;

  tokio::fs::write(&tmp_path, &data)
    .await
    .with_context(|| format!("failed to write {}", tmp_path.display()))?;

  tokio::fs::rename(&tmp_path, path).await.with_context(|| {
    format!(
      "failed to rename {} to {}",
      tmp_path.display(),
      path.display()
    )
  })?;

  Ok(())
}

/// Reads and parses `path` as JSON, returning `Ok(None)` if it doesn't exist.
pub async fn read_json_opt<T: DeserializeOwned>(
  path: &Path,
) -> Result<Option<T>> {
  match tokio::fs::read(path).await {
    Ok(bytes) => {
      let value = serde_json::from_slice(&bytes).with_context(|| {
        format!("failed to parse {} as JSON", path.display())
      })?;
      Ok(Some(value))
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(e) => {
      Err(e).with_context(|| format!("failed to read {}", path.display()))
    }
  }
}

#[cfg(test)]
mod tests {
  use serde::{Deserialize, Serialize};
  use tempfile::tempdir;

  use super::*;

  #[derive(Debug, Serialize, Deserialize, PartialEq)]
  struct Sample {
    value: u32,
  }

  #[tokio::test]
  async fn roundtrips_through_tmp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("sample.json");
    atomic_write_json(&path, &Sample { value: 7 }).await.unwrap();

    let loaded: Option<Sample> = read_json_opt(&path).await.unwrap();
    assert_eq!(loaded, Some(Sample { value: 7 }));
    assert!(!path.with_extension("tmp").exists());
  }

  #[tokio::test]
  async fn missing_file_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.json");
    let loaded: Option<Sample> = read_json_opt(&path).await.unwrap();
    assert_eq!(loaded, None);
  }
}
