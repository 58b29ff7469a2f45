use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{StatePaths, io};

/// Per-service record of the last successful build: a content hash per
/// tracked file plus the resulting image reference, so the executor can
/// skip rebuilding a service whose build context hasn't changed (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildCacheEntry {
  pub file_hashes: BTreeMap<String, String>,
  pub last_build_timestamp: i64,
  pub image_reference: String,
}

pub struct BuildCache<'a> {
  paths: &'a StatePaths,
}

impl<'a> BuildCache<'a> {
  pub fn new(paths: &'a StatePaths) -> Self {
    Self { paths }
  }

  pub async fn get(&self, service: &str) -> Result<Option<BuildCacheEntry>> {
    io::read_json_opt(&self.paths.build_cache_file(service)).await
  }

  pub async fn set(
    &self,
    service: &str,
    entry: &BuildCacheEntry,
  ) -> Result<()> {
    io::atomic_write_json(&self.paths.build_cache_file(service), entry)
      .await
      .with_context(|| {
        format!("failed to persist build cache for service '{service}'")
      })
  }

  /// Whether `current_hashes` differ from what's on record for `service`
  /// — a changed build context (or no prior cache entry at all) means
  /// the build must run again.
  pub async fn is_stale(
    &self,
    service: &str,
    current_hashes: &BTreeMap<String, String>,
  ) -> Result<bool> {
    Ok(match self.get(service).await? {
      Some(entry) => &entry.file_hashes != current_hashes,
      None => true,
    })
  }
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[tokio::test]
  async fn missing_entry_is_always_stale() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let cache = BuildCache::new(&paths);
    assert!(cache.is_stale("web", &BTreeMap::new()).await.unwrap());
  }

  #[tokio::test]
  async fn unchanged_hashes_are_not_stale() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let cache = BuildCache::new(&paths);

    let mut hashes = BTreeMap::new();
    hashes.insert("Dockerfile".to_string(), "abc123".to_string());

    cache
      .set(
        "web",
        &BuildCacheEntry {
          file_hashes: hashes.clone(),
          last_build_timestamp: 0,
          image_reference: "acme/web:abc123".into(),
        },
      )
      .await
      .unwrap();

    assert!(!cache.is_stale("web", &hashes).await.unwrap());
  }
}
