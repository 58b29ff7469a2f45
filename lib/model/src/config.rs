use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
  environment::Environment, project::Project, server::Server,
  volume::NamedVolume,
};

#[derive(
  Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategyKind {
  #[default]
  Parallel,
  Sequential,
}

#[derive(
  Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelStrategy {
  #[default]
  DependencyAware,
  ResourceAware,
  RoundRobin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
  #[serde(default = "default_concurrent_builds")]
  pub max_concurrent_builds: usize,
  #[serde(default = "default_concurrent_deploys")]
  pub max_concurrent_deploys: usize,
  #[serde(default)]
  pub strategy: ParallelStrategy,
}

fn default_concurrent_builds() -> usize {
  4
}
fn default_concurrent_deploys() -> usize {
  4
}

impl Default for ParallelConfig {
  fn default() -> Self {
    Self {
      max_concurrent_builds: default_concurrent_builds(),
      max_concurrent_deploys: default_concurrent_deploys(),
      strategy: ParallelStrategy::default(),
    }
  }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildCacheConfig {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub r#type: Option<String>,
  #[serde(default)]
  pub retention: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
  #[serde(default)]
  pub strategy: DeploymentStrategyKind,
  #[serde(default)]
  pub parallel: ParallelConfig,
  #[serde(default)]
  pub cache: BuildCacheConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
  #[serde(default)]
  pub slack: Option<String>,
  #[serde(default)]
  pub discord: Option<String>,
  #[serde(default)]
  pub webhook: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NfsConfig {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub server: Option<String>,
  #[serde(default)]
  pub exports: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
  #[serde(default)]
  pub nfs: NfsConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfrastructureConfig {
  #[serde(default)]
  pub provider: Option<String>,
  #[serde(default)]
  pub region: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

/// The single root object of the configuration document (§6). Parsing
/// this document from YAML/JSON and resolving `${NAME}` references is
/// the stated out-of-scope collaborator; this type is the contract the
/// core accepts once that parsing has happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
  pub project: Project,
  #[serde(default)]
  pub infrastructure: InfrastructureConfig,
  #[serde(default)]
  pub deployment: DeploymentConfig,
  #[serde(default)]
  pub notifications: NotificationsConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub volumes: IndexMap<String, NamedVolume>,
  pub servers: IndexMap<String, Server>,
  pub environments: IndexMap<String, Environment>,
}
