use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How the transport pool authenticates to a [`Server`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAuth {
  KeyPath(String),
  Password(String),
}

/// A node's role in the cluster. `Unset` means the cluster bootstrap
/// decides it (first listed server wins if no `Manager` is present).
#[derive(
  Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
  Manager,
  Worker,
  #[default]
  Unset,
}

/// A remote host and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
  pub name: String,
  pub host: String,
  pub user: String,
  #[serde(default = "default_ssh_port")]
  pub port: u16,
  pub auth: ServerAuth,
  #[serde(default)]
  pub role: ServerRole,
  #[serde(default)]
  pub labels: BTreeMap<String, String>,
}

fn default_ssh_port() -> u16 {
  22
}

impl Server {
  pub fn is_manager(&self) -> bool {
    self.role == ServerRole::Manager
  }
}
