use thiserror::Error;

/// The error-kind taxonomy a caller must be able to distinguish (§7).
/// Plumbing errors stay as plain `anyhow::Error`; callers that need to
/// branch on *kind* (the CLI's exit-code mapping, the executor's
/// composite-error report) downcast to this.
#[derive(Debug, Error)]
pub enum TakoError {
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error(
    "lock held by {holder} ({operation}) since {age_secs}s ago"
  )]
  LockContention {
    holder: String,
    operation: String,
    age_secs: i64,
  },

  #[error("transport error talking to {host}: {message}")]
  Transport { host: String, message: String },

  #[error("state inconsistency: {0}")]
  StateInconsistency(String),

  #[error("secret resolution error: {0}")]
  SecretResolution(String),

  #[error("external service error: {0}")]
  ExternalService(String),
}

impl TakoError {
  /// Exit code this error kind maps to, per spec §6. Success (0) and
  /// "changes pending" (2) are not error conditions and are produced
  /// directly by the CLI, not through this mapping.
  pub fn exit_code(&self) -> i32 {
    match self {
      TakoError::LockContention { .. } => 3,
      TakoError::Configuration(_) => 4,
      TakoError::Transport { .. }
      | TakoError::StateInconsistency(_)
      | TakoError::SecretResolution(_)
      | TakoError::ExternalService(_) => 1,
    }
  }
}

/// Walks an `anyhow::Error`'s cause chain looking for a [`TakoError`],
/// so a caller several `.context()` calls removed from the origin can
/// still recover the kind.
pub fn find_tako_error(err: &anyhow::Error) -> Option<&TakoError> {
  err.chain().find_map(|cause| cause.downcast_ref::<TakoError>())
}
