use std::{
  path::{Path, PathBuf},
  process::Stdio,
  sync::OnceLock,
};

mod output;
mod quote;

pub use output::*;
pub use quote::{quote, quote_args};
use tokio::process::Command;

/// The record of one executed command, local or remote. Every lifecycle
/// hook, build step, and local tool invocation (`docker save`, `ssh`)
/// produces one of these so the executor can attach it to a
/// [`ServiceDeploymentOutcome`][model::ServiceDeploymentOutcome] or the
/// deploy log.
#[derive(Debug, Clone)]
pub struct Log {
  pub stage: String,
  pub command: String,
  pub stdout: String,
  pub stderr: String,
  pub success: bool,
  pub start_ts: i64,
  pub end_ts: i64,
}

fn now_ms() -> i64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or_default()
}

/// Commands are run directly, and cannot include '&&'.
pub async fn run_standard_command_logged(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl Into<String>,
) -> Log {
  let command = command.into();
  let start_ts = now_ms();
  let output = run_standard_command(&command, path).await;
  output_into_log(stage, command, start_ts, output)
}

/// Commands are wrapped in `sh -c`, and can include `&&`.
pub async fn run_shell_command_logged(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl Into<String>,
) -> Log {
  let command = command.into();
  let start_ts = now_ms();
  let output = run_shell_command(&command, path).await;
  output_into_log(stage, command, start_ts, output)
}

pub enum TakoCommandMode {
  Standard,
  Shell,
}

/// Executes the command and sanitizes the output so that no secret value
/// from `replacers` is exposed in the returned [`Log`]. This is the
/// local-process counterpart of `redact::Redactor::redact` — the
/// redactor wraps remote output, this wraps anything run on the
/// orchestrator's own host (builds, `pre_build` hooks).
pub async fn run_command_with_sanitization(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
  mode: TakoCommandMode,
  replacers: &[(String, String)],
) -> Log {
  let mut log = match mode {
    TakoCommandMode::Standard => {
      run_standard_command_logged(stage, path, command.as_ref().to_string())
        .await
    }
    TakoCommandMode::Shell => {
      run_shell_command_logged(stage, path, command.as_ref().to_string())
        .await
    }
  };

  log.command = svi::replace_in_string(&log.command, replacers);
  log.stdout = svi::replace_in_string(&log.stdout, replacers);
  log.stderr = svi::replace_in_string(&log.stderr, replacers);

  log
}

pub fn output_into_log(
  stage: &str,
  command: String,
  start_ts: i64,
  output: CommandOutput,
) -> Log {
  Log {
    stage: stage.to_string(),
    success: output.success(),
    stdout: output.stdout,
    stderr: output.stderr,
    command,
    start_ts,
    end_ts: now_ms(),
  }
}

/// Commands are run directly, and cannot include '&&'. The command is
/// lexed with `shlex`, never handed to a shell — this is the allowlisted
/// execution path secret command-substitution (§4.4) relies on.
pub async fn run_standard_command(
  command: &str,
  path: impl Into<Option<&Path>>,
) -> CommandOutput {
  let lexed = if let Some(lexed) = shlex::split(command)
    && !lexed.is_empty()
  {
    lexed
  } else {
    return CommandOutput::from_err(std::io::Error::other(
      "command lexed into empty args",
    ));
  };

  let mut cmd = Command::new(&lexed[0]);

  cmd
    .args(&lexed[1..])
    .kill_on_drop(true)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

  if let Some(path) = path.into() {
    match path.canonicalize() {
      Ok(path) => {
        cmd.current_dir(path);
      }
      Err(e) => return CommandOutput::from_err(e),
    }
  }

  CommandOutput::from(cmd.output().await)
}

fn shell() -> &'static str {
  static DEFAULT_SHELL: OnceLock<String> = OnceLock::new();
  DEFAULT_SHELL.get_or_init(|| {
    if PathBuf::from("/bin/bash").exists()
      || PathBuf::from("/usr/bin/bash").exists()
    {
      String::from("bash")
    } else {
      String::from("sh")
    }
  })
}

/// Commands are wrapped in `sh -c`, and can include `&&`.
pub async fn run_shell_command(
  command: &str,
  path: impl Into<Option<&Path>>,
) -> CommandOutput {
  let mut cmd = Command::new(shell());

  cmd
    .args(["-c", command])
    .kill_on_drop(true)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

  if let Some(path) = path.into() {
    match path.canonicalize() {
      Ok(path) => {
        cmd.current_dir(path);
      }
      Err(e) => return CommandOutput::from_err(e),
    }
  }

  CommandOutput::from(cmd.output().await)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn standard_command_runs_and_captures_stdout() {
    let out = run_standard_command("echo hello", None).await;
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "hello");
  }

  #[tokio::test]
  async fn shell_command_supports_and_chains() {
    let out = run_shell_command("echo a && echo b", None).await;
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "a\nb");
  }

  #[tokio::test]
  async fn sanitization_replaces_secret_in_output() {
    let log = run_command_with_sanitization(
      "test",
      None,
      "echo topsecret",
      TakoCommandMode::Shell,
      &[("topsecret".to_string(), "[REDACTED]".to_string())],
    )
    .await;
    assert!(!log.stdout.contains("topsecret"));
    assert!(log.stdout.contains("[REDACTED]"));
  }
}
