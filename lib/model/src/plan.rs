use serde::{Deserialize, Serialize};

use crate::service::Service;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
  Add,
  Update,
  Remove,
  NoOp,
}

/// One service's diff between desired and observed state, with the
/// human-readable reasons the planner attached (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
  pub service: String,
  pub change_type: ChangeType,
  pub reasons: Vec<String>,
  pub old_config: Option<Service>,
  pub new_config: Option<Service>,
}

impl Change {
  pub fn no_op(service: impl Into<String>, reason: impl Into<String>) -> Self {
    Self {
      service: service.into(),
      change_type: ChangeType::NoOp,
      reasons: vec![reason.into()],
      old_config: None,
      new_config: None,
    }
  }

  pub fn add(service: impl Into<String>, new_config: Service) -> Self {
    Self {
      service: service.into(),
      change_type: ChangeType::Add,
      reasons: vec!["defined in config, not deployed".to_string()],
      old_config: None,
      new_config: Some(new_config),
    }
  }

  pub fn update(
    service: impl Into<String>,
    old_config: Service,
    new_config: Service,
    reasons: Vec<String>,
  ) -> Self {
    Self {
      service: service.into(),
      change_type: ChangeType::Update,
      reasons,
      old_config: Some(old_config),
      new_config: Some(new_config),
    }
  }

  pub fn remove(service: impl Into<String>, reason: impl Into<String>) -> Self {
    Self {
      service: service.into(),
      change_type: ChangeType::Remove,
      reasons: vec![reason.into()],
      old_config: None,
      new_config: None,
    }
  }

  pub fn is_destructive(&self) -> bool {
    self.change_type == ChangeType::Remove
  }

  pub fn needs_confirmation(&self) -> bool {
    matches!(self.change_type, ChangeType::Update | ChangeType::Remove)
  }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PlanSummary {
  pub total: usize,
  pub adds: usize,
  pub updates: usize,
  pub removes: usize,
  pub no_ops: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
  pub project: String,
  pub environment: String,
  pub changes: Vec<Change>,
  pub summary: PlanSummary,
}

impl Plan {
  pub fn new(
    project: impl Into<String>,
    environment: impl Into<String>,
    changes: Vec<Change>,
  ) -> Self {
    let mut summary = PlanSummary::default();
    for change in &changes {
      summary.total += 1;
      match change.change_type {
        ChangeType::Add => summary.adds += 1,
        ChangeType::Update => summary.updates += 1,
        ChangeType::Remove => summary.removes += 1,
        ChangeType::NoOp => summary.no_ops += 1,
      }
    }
    Self {
      project: project.into(),
      environment: environment.into(),
      changes,
      summary,
    }
  }

  pub fn has_destructive_changes(&self) -> bool {
    self.changes.iter().any(Change::is_destructive)
  }

  pub fn needs_confirmation(&self) -> bool {
    self.changes.iter().any(Change::needs_confirmation)
  }

  pub fn has_changes(&self) -> bool {
    self.summary.adds > 0 || self.summary.updates > 0 || self.summary.removes > 0
  }

  pub fn adds(&self) -> impl Iterator<Item = &Change> {
    self
      .changes
      .iter()
      .filter(|c| c.change_type == ChangeType::Add)
  }

  pub fn updates(&self) -> impl Iterator<Item = &Change> {
    self
      .changes
      .iter()
      .filter(|c| c.change_type == ChangeType::Update)
  }

  pub fn removes(&self) -> impl Iterator<Item = &Change> {
    self
      .changes
      .iter()
      .filter(|c| c.change_type == ChangeType::Remove)
  }
}

/// Severity of an observed deviation from desired state, used by the
/// drift variant of the planner (§4.9 "Drift variant (C12)").
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
  Low,
  Medium,
  High,
  Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
  /// Present in observed only (someone changed the live state by hand).
  Manual,
  /// Present in desired only (the live state never caught up).
  Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftItem {
  pub service: String,
  /// `env:KEY`, `volume:/target`, `label:key`, or `replicas`.
  pub field: String,
  pub kind: DriftKind,
  pub severity: DriftSeverity,
  pub detail: String,
}

/// Classifies replica-down severity, per §4.9:
/// `actual==0` critical, `actual/expected < 0.5` high, `<1.0` medium,
/// else low.
pub fn replica_down_severity(actual: u32, expected: u32) -> DriftSeverity {
  if actual == 0 {
    return DriftSeverity::Critical;
  }
  if expected == 0 {
    return DriftSeverity::Low;
  }
  let ratio = actual as f64 / expected as f64;
  if ratio < 0.5 {
    DriftSeverity::High
  } else if ratio < 1.0 {
    DriftSeverity::Medium
  } else {
    DriftSeverity::Low
  }
}
