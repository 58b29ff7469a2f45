use std::path::{Path, PathBuf};

/// Everything tako persists about a project lives under `<project>/.tako/`.
/// This mirrors the project directory 1:1 so multiple projects on the
/// same host (or the same project checked out twice) never collide.
#[derive(Debug, Clone)]
pub struct StatePaths {
  root: PathBuf,
}

pub const MAX_HISTORY_ENTRIES: usize = 50;

impl StatePaths {
  pub fn new(project_root: impl AsRef<Path>) -> Self {
    Self { root: project_root.as_ref().join(".tako") }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn global_state_file(&self) -> PathBuf {
    self.root.join("cluster-state.json")
  }

  pub fn environment_dir(&self, environment: &str) -> PathBuf {
    self.root.join("environments").join(environment)
  }

  pub fn current_deployment_file(&self, environment: &str) -> PathBuf {
    self.environment_dir(environment).join("current.json")
  }

  pub fn history_dir(&self, environment: &str) -> PathBuf {
    self.environment_dir(environment).join("history")
  }

  pub fn history_entry_file(
    &self,
    environment: &str,
    history_key: &str,
  ) -> PathBuf {
    self.history_dir(environment).join(format!("{history_key}.json"))
  }

  pub fn rollback_file(&self, environment: &str) -> PathBuf {
    self.environment_dir(environment).join("rollback").join("last-stable.json")
  }

  pub fn service_state_file(
    &self,
    environment: &str,
    service: &str,
  ) -> PathBuf {
    self
      .environment_dir(environment)
      .join("services")
      .join(format!("{service}.json"))
  }

  pub fn build_cache_file(&self, service: &str) -> PathBuf {
    self.root.join("build-cache").join(format!("{service}.json"))
  }

  pub fn resource_graph_dir(&self) -> PathBuf {
    self.root.join("resources")
  }

  pub fn resource_file(&self, urn: &str) -> PathBuf {
    self.resource_graph_dir().join(format!("{}.json", sanitize_urn(urn)))
  }

  pub fn lock_file(&self) -> PathBuf {
    self.root.join(".lock")
  }

  pub fn deploy_log_file(&self, environment: &str) -> PathBuf {
    self.environment_dir(environment).join("deploy.log")
  }
}

/// URNs contain `:` and `/`, neither of which are safe path components
/// on every platform we care about.
fn sanitize_urn(urn: &str) -> String {
  urn.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_urn_replaces_separators() {
    assert_eq!(
      sanitize_urn("urn:tako:acme:prod:swarm-service:web"),
      "urn_tako_acme_prod_swarm-service_web"
    );
  }
}
