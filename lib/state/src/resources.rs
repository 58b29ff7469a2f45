use anyhow::{Context, Result};
use model::Resource;

use crate::{StatePaths, io};

/// The on-disk resource graph: one JSON file per [`Resource`], keyed by
/// URN. Dependency ordering is computed by the resolver from the `deps`
/// each resource records, not stored here — this is pure storage.
pub struct ResourceGraph<'a> {
  paths: &'a StatePaths,
}

impl<'a> ResourceGraph<'a> {
  pub fn new(paths: &'a StatePaths) -> Self {
    Self { paths }
  }

  pub async fn get(&self, urn: &str) -> Result<Option<Resource>> {
    io::read_json_opt(&self.paths.resource_file(urn)).await
  }

  pub async fn upsert(&self, resource: &Resource) -> Result<()> {
    io::atomic_write_json(&self.paths.resource_file(&resource.urn), resource)
      .await
      .with_context(|| format!("failed to persist resource {}", resource.urn))
  }

  pub async fn delete(&self, urn: &str) -> Result<()> {
    let path = self.paths.resource_file(urn);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => {
        Err(e).with_context(|| format!("failed to delete resource {urn}"))
      }
    }
  }

  /// Returns every resource currently tracked, in no particular order —
  /// callers that need dependency order should feed this to the
  /// resolver's topological sort.
  pub async fn list(&self) -> Result<Vec<Resource>> {
    let dir = self.paths.resource_graph_dir();
    let mut read_dir = match tokio::fs::read_dir(&dir).await {
      Ok(rd) => rd,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(Vec::new());
      }
      Err(e) => {
        return Err(e).with_context(|| {
          format!("failed to read resource graph dir {}", dir.display())
        });
      }
    };

    let mut resources = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
      if let Some(resource) =
        io::read_json_opt::<Resource>(&entry.path()).await?
      {
        resources.push(resource);
      }
    }
    Ok(resources)
  }
}

#[cfg(test)]
mod tests {
  use model::{ResourceStatus, ResourceType};
  use tempfile::tempdir;

  use super::*;

  fn sample(urn: &str) -> Resource {
    Resource {
      urn: urn.to_string(),
      ty: ResourceType::Service,
      provider: "docker".into(),
      status: ResourceStatus::Created,
      inputs: Default::default(),
      outputs: Default::default(),
      dependencies: Vec::new(),
      parent: None,
      inputs_hash: "abc".into(),
    }
  }

  #[tokio::test]
  async fn upsert_then_get_roundtrips() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let graph = ResourceGraph::new(&paths);

    graph.upsert(&sample("urn:tako:acme:prod:swarm-service:web")).await.unwrap();
    let loaded =
      graph.get("urn:tako:acme:prod:swarm-service:web").await.unwrap().unwrap();
    assert_eq!(loaded.provider, "docker");
  }

  #[tokio::test]
  async fn delete_is_idempotent() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let graph = ResourceGraph::new(&paths);
    graph.delete("urn:tako:acme:prod:swarm-service:nonexistent").await.unwrap();
  }

  #[tokio::test]
  async fn list_returns_all_upserted_resources() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let graph = ResourceGraph::new(&paths);

    graph.upsert(&sample("urn:tako:acme:prod:swarm-service:a")).await.unwrap();
    graph.upsert(&sample("urn:tako:acme:prod:swarm-service:b")).await.unwrap();

    let all = graph.list().await.unwrap();
    assert_eq!(all.len(), 2);
  }
}
