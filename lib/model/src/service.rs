use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::volume::VolumeMount;

/// Exactly one of `build_context_path` or `image_reference` is set on a
/// [`Service`]; this union is validated at config load time per the
/// "dynamic dispatch on config shape" design note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
  /// Build an image from this local path, then distribute it (§4.6).
  Build { build_context_path: String },
  /// Pull this reference as-is; never built locally.
  Image { image_reference: String },
}

impl ImageSource {
  pub fn image_reference(&self) -> Option<&str> {
    match self {
      ImageSource::Build { .. } => None,
      ImageSource::Image { image_reference } => Some(image_reference),
    }
  }

  pub fn build_context_path(&self) -> Option<&str> {
    match self {
      ImageSource::Build { build_context_path } => {
        Some(build_context_path)
      }
      ImageSource::Image { .. } => None,
    }
  }
}

#[derive(
  Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
  #[default]
  Any,
  OnFailure,
  None,
}

/// TLS behavior for a public service's certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
  #[serde(default = "default_true")]
  pub auto_provision: bool,
  #[serde(default)]
  pub cert_resolver: Option<String>,
}

fn default_true() -> bool {
  true
}

/// Reverse-proxy configuration for a public service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
  pub primary_domain: String,
  #[serde(default)]
  pub redirect_from: Vec<String>,
  #[serde(default)]
  pub legacy_domains: Vec<String>,
  #[serde(default)]
  pub email_for_certificate: Option<String>,
  #[serde(default)]
  pub tls_config: Option<TlsConfig>,
}

#[derive(
  Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
  Spread,
  Pinned,
  Global,
  #[default]
  Any,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
  #[serde(default)]
  pub strategy: PlacementStrategy,
  #[serde(default)]
  pub pinned_hosts: Vec<String>,
  /// Arbitrary `node.labels.x==y` style constraints, appended verbatim
  /// (single-quoted) after the ones §4.12 derives from `strategy`.
  #[serde(default)]
  pub constraints: Vec<String>,
  #[serde(default)]
  pub preferences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
  pub path: String,
  #[serde(default = "default_interval_secs")]
  pub interval: u32,
  #[serde(default = "default_timeout_secs")]
  pub timeout: u32,
  #[serde(default = "default_retries")]
  pub retries: u32,
  #[serde(default)]
  pub start_period: u32,
}

fn default_interval_secs() -> u32 {
  10
}
fn default_timeout_secs() -> u32 {
  5
}
fn default_retries() -> u32 {
  3
}

/// Lifecycle hook commands, run via `lib/command`'s shell-command path.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHooks {
  #[serde(default)]
  pub pre_build: Vec<String>,
  #[serde(default)]
  pub post_build: Vec<String>,
  #[serde(default)]
  pub pre_deploy: Vec<String>,
  #[serde(default)]
  pub post_deploy: Vec<String>,
  #[serde(default)]
  pub post_start: Vec<String>,
}

impl LifecycleHooks {
  pub fn all_commands(&self) -> impl Iterator<Item = &str> {
    self
      .pre_build
      .iter()
      .chain(&self.post_build)
      .chain(&self.pre_deploy)
      .chain(&self.post_deploy)
      .chain(&self.post_start)
      .map(String::as_str)
  }
}

/// The core desired unit: a logical service within an [`crate::Environment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
  pub name: String,
  #[serde(flatten)]
  pub image: ImageSource,

  #[serde(default)]
  pub port: u16,
  #[serde(default)]
  pub command: Option<String>,
  #[serde(default = "default_replicas")]
  pub replicas: u32,
  #[serde(default)]
  pub restart_policy: RestartPolicy,
  /// Ordered so env-file materialization (§4.4) is deterministic even
  /// before the final sort-by-key pass.
  #[serde(default)]
  pub env_map: IndexMap<String, String>,
  #[serde(default)]
  pub env_file_path: Option<String>,
  #[serde(default)]
  pub secret_refs: Vec<String>,
  #[serde(default)]
  pub volume_mounts: Vec<VolumeMount>,
  #[serde(default)]
  pub init_commands: Vec<String>,

  #[serde(default)]
  pub persistent: bool,
  #[serde(default)]
  pub exports: Vec<String>,
  #[serde(default)]
  pub imports: Vec<String>,

  #[serde(default)]
  pub proxy: Option<ProxyConfig>,

  #[serde(default)]
  pub placement: Placement,

  #[serde(default)]
  pub depends_on: Vec<String>,

  #[serde(default)]
  pub health_check: Option<HealthCheck>,

  #[serde(default)]
  pub hooks: LifecycleHooks,
}

fn default_replicas() -> u32 {
  1
}

/// The derived classification of a service, per spec §3: "Classification
/// derived". `Persistent` always wins regardless of the other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceClass {
  Persistent,
  Public,
  Internal,
  Worker,
}

impl Service {
  /// Effective replica count, normalising the `0` and unset cases to `1`
  /// the way the planner's replica-change comparison does.
  pub fn normalized_replicas(&self) -> u32 {
    if self.replicas == 0 { 1 } else { self.replicas }
  }

  pub fn classify(&self) -> ServiceClass {
    if self.persistent {
      ServiceClass::Persistent
    } else if self.proxy.is_some() {
      ServiceClass::Public
    } else if self.port > 0 {
      ServiceClass::Internal
    } else {
      ServiceClass::Worker
    }
  }

  /// All environment-variable *values*, for dependency inference (§4.7)
  /// and secret-reference scanning.
  pub fn env_values(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .env_map
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Reserved hook names that a service may not declare a lifecycle hook
  /// under (§4.11 validation step).
  pub const RESERVED_HOOK_NAMES: &'static [&'static str] =
    &["tako", "docker", "sh", "bash"];
}
