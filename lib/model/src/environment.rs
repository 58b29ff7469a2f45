use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{server::Server, service::Service, volume::NamedVolume};

/// A named deployment realm within a project, e.g. `production`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
  pub name: String,
  pub member_servers: Vec<Server>,
  #[serde(default)]
  pub environment_labels: BTreeMap<String, String>,
  /// Keyed by logical service name; `IndexMap` preserves declaration
  /// order for diagnostics, though the resolver imposes the real order.
  pub services: IndexMap<String, Service>,
  #[serde(default)]
  pub volumes: IndexMap<String, NamedVolume>,
}

impl Environment {
  pub fn manager_candidates(&self) -> impl Iterator<Item = &Server> {
    self.member_servers.iter()
  }

  pub fn is_single_host(&self) -> bool {
    self.member_servers.len() <= 1
  }

  /// The service that should be the cluster manager: the explicitly
  /// configured one, else the first server listed (§4.5 Bootstrap).
  pub fn designated_manager(&self) -> Option<&Server> {
    self
      .member_servers
      .iter()
      .find(|s| s.is_manager())
      .or_else(|| self.member_servers.first())
  }
}
