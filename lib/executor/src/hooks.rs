use anyhow::bail;
use command::{Log, TakoCommandMode, run_command_with_sanitization};
use indexmap::IndexMap;
use model::Service;

/// Shell metacharacters a hook command may never contain — hooks run
/// through `sh -c`, and these let a declared hook escape the command it
/// was supposed to be rather than a side effect of it.
const DISALLOWED_METACHARACTERS: &[char] = &['`', '$', ';', '|', '&', '\n'];

/// Validates every hook a service declares, per §4.11: no reserved hook
/// name, no shell metacharacters.
pub fn validate(service: &Service) -> anyhow::Result<()> {
  for command in service.hooks.all_commands() {
    for reserved in Service::RESERVED_HOOK_NAMES {
      if command.trim_start().starts_with(reserved)
        && command.trim_start()[reserved.len()..].starts_with(char::is_whitespace)
      {
        bail!(
          "hook command for '{}' begins with reserved name '{reserved}'",
          service.name
        );
      }
    }
    if command.contains(DISALLOWED_METACHARACTERS) {
      bail!(
        "hook command for '{}' contains a disallowed shell metacharacter: '{command}'",
        service.name
      );
    }
  }
  Ok(())
}

/// Runs `commands` in order, each with the process environment augmented
/// by `env`, stopping at the first failure. Returns the logs produced,
/// including the one that failed, so the caller can attach them to the
/// deployment record.
pub async fn run_stage(
  stage: &str,
  commands: &[String],
  env: &IndexMap<String, String>,
  replacers: &[(String, String)],
) -> anyhow::Result<Vec<Log>> {
  let mut logs = Vec::with_capacity(commands.len());
  for command in commands {
    let prefixed = prefix_with_env(command, env);
    let log = run_command_with_sanitization(
      stage,
      None,
      prefixed,
      TakoCommandMode::Shell,
      replacers,
    )
    .await;
    let failed = !log.success;
    logs.push(log);
    if failed {
      bail!("hook command failed during '{stage}': {}", commands.join(" && "));
    }
  }
  Ok(logs)
}

fn prefix_with_env(command: &str, env: &IndexMap<String, String>) -> String {
  if env.is_empty() {
    return command.to_string();
  }
  let assignments: String = env
    .iter()
    .map(|(k, v)| format!("{k}={} ", command::quote(v)))
    .collect();
  format!("{assignments}{command}")
}

#[cfg(test)]
mod tests {
  use model::ImageSource;

  use super::*;

  fn service_with_hooks(pre_deploy: Vec<String>) -> Service {
    Service {
      name: "web".into(),
      image: ImageSource::Image { image_reference: "api:1".into() },
      port: 0,
      command: None,
      replicas: 1,
      restart_policy: Default::default(),
      env_map: Default::default(),
      env_file_path: None,
      secret_refs: vec![],
      volume_mounts: vec![],
      init_commands: vec![],
      persistent: false,
      exports: vec![],
      imports: vec![],
      proxy: None,
      placement: Default::default(),
      depends_on: vec![],
      health_check: None,
      hooks: model::LifecycleHooks { pre_deploy, ..Default::default() },
    }
  }

  #[test]
  fn rejects_reserved_hook_name() {
    let service = service_with_hooks(vec!["docker rm -f web".to_string()]);
    assert!(validate(&service).is_err());
  }

  #[test]
  fn rejects_shell_metacharacters() {
    let service = service_with_hooks(vec!["echo hi; rm -rf /".to_string()]);
    assert!(validate(&service).is_err());
  }

  #[test]
  fn accepts_a_plain_command() {
    let service = service_with_hooks(vec!["./migrate.sh".to_string()]);
    assert!(validate(&service).is_ok());
  }

  #[tokio::test]
  async fn run_stage_prefixes_env_and_runs_command() {
    let mut env = IndexMap::new();
    env.insert("GREETING".to_string(), "hi".to_string());
    let logs = run_stage(
      "pre_deploy",
      &["echo $GREETING".to_string()],
      &env,
      &[],
    )
    .await
    .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].stdout.trim(), "hi");
  }
}
