//! Configuration document loading (§6): locate the file (CLI flag > env
//! var > default filenames), expand `${NAME}` references against the
//! process environment, parse as YAML or JSON, then validate the parsed
//! document beyond what serde's `deny_unknown_fields` already rejects.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use model::{ConfigDocument, Environment, TakoError};
use regex::Regex;
use std::sync::OnceLock;
use validations::{StringValidator, StringValidatorMatches, validate_bind_mount_source};

const DEFAULT_FILENAMES: &[&str] = &["tako.yaml", "tako.yml", "tako.json"];

pub fn resolve_config_path(cli_flag: Option<&str>, project_root: &Path) -> Result<PathBuf> {
  if let Some(path) = cli_flag {
    return Ok(project_root.join(path));
  }
  if let Ok(path) = std::env::var("TAKO_CONFIG") {
    return Ok(project_root.join(path));
  }
  for candidate in DEFAULT_FILENAMES {
    let path = project_root.join(candidate);
    if path.exists() {
      return Ok(path);
    }
  }
  Err(
    TakoError::Configuration(format!(
      "no configuration file found: pass --config, set TAKO_CONFIG, or place one of {DEFAULT_FILENAMES:?} in {}",
      project_root.display()
    ))
    .into(),
  )
}

pub async fn load(path: &Path) -> Result<ConfigDocument> {
  let raw = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read configuration file {}", path.display()))?;

  let expanded = expand_env_refs(&raw).with_context(|| format!("in {}", path.display()))?;

  let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
  let parsed = if is_json {
    serde_json::from_str::<ConfigDocument>(&expanded).map_err(|e| e.to_string())
  } else {
    serde_yaml_ng::from_str::<ConfigDocument>(&expanded).map_err(|e| e.to_string())
  };
  let document = parsed.map_err(|e| {
    TakoError::Configuration(format!("failed to parse {}: {e}", path.display()))
  })?;

  validate(&document).map_err(|e| TakoError::Configuration(e.to_string()))?;
  Ok(document)
}

fn env_ref_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"))
}

/// Replaces every `${NAME}` with the trimmed value of the process
/// environment variable `NAME`. Unlike `lib/secrets`'s expansion (which
/// resolves references within the secrets scope itself, plus allowlisted
/// command substitutions), this only ever reads the process environment
/// — the configuration document has no scope of its own to chain through.
fn expand_env_refs(input: &str) -> Result<String> {
  let pattern = env_ref_pattern();
  let mut out = String::with_capacity(input.len());
  let mut last_end = 0;
  for caps in pattern.captures_iter(input) {
    let whole = caps.get(0).unwrap();
    let name = &caps[1];
    let value = std::env::var(name)
      .map_err(|_| anyhow::anyhow!("'${{{name}}}' references an unset environment variable"))?;
    out.push_str(&input[last_end..whole.start()]);
    out.push_str(value.trim());
    last_end = whole.end();
  }
  out.push_str(&input[last_end..]);
  Ok(out)
}

fn validate(document: &ConfigDocument) -> Result<()> {
  let resource_name = || StringValidator::default().min_length(1).max_length(63).matches(StringValidatorMatches::ResourceName);

  resource_name().validate(&document.project.name).context("invalid project name")?;

  for key in document.servers.keys() {
    resource_name().validate(key).with_context(|| format!("invalid server key '{key}'"))?;
  }

  for (env_name, environment) in &document.environments {
    resource_name().validate(env_name).with_context(|| format!("invalid environment name '{env_name}'"))?;
    validate_environment(environment)?;
  }

  for (key, volume) in &document.volumes {
    resource_name().validate(key).with_context(|| format!("invalid volume key '{key}'"))?;
    let _ = volume;
  }

  if let Some(webhook) = &document.notifications.webhook {
    StringValidator::default().matches(StringValidatorMatches::HttpUrl).validate(webhook).context("invalid notifications.webhook URL")?;
  }
  if let Some(slack) = &document.notifications.slack {
    StringValidator::default().matches(StringValidatorMatches::HttpUrl).validate(slack).context("invalid notifications.slack URL")?;
  }
  if let Some(discord) = &document.notifications.discord {
    StringValidator::default().matches(StringValidatorMatches::HttpUrl).validate(discord).context("invalid notifications.discord URL")?;
  }

  Ok(())
}

fn validate_environment(environment: &Environment) -> Result<()> {
  let resource_name = || StringValidator::default().min_length(1).max_length(63).matches(StringValidatorMatches::ResourceName);
  let variable_name = || StringValidator::default().min_length(1).matches(StringValidatorMatches::VariableName);

  for (name, service) in &environment.services {
    resource_name().validate(name).with_context(|| format!("invalid service name '{name}'"))?;

    for dep in &service.depends_on {
      if !environment.services.contains_key(dep) {
        bail!("service '{name}' in environment '{}' depends on undeclared service '{dep}'", environment.name);
      }
    }

    for key in service.env_map.keys() {
      variable_name().validate(key).with_context(|| format!("invalid env var name '{key}' on service '{name}'"))?;
    }

    for mount in &service.volume_mounts {
      if mount.bind {
        validate_bind_mount_source(&mount.source).with_context(|| format!("service '{name}' mount"))?;
      } else if !environment.volumes.contains_key(&mount.source) {
        bail!("service '{name}' mounts undeclared volume '{}'", mount.source);
      }
    }

    if service.placement.strategy == model::PlacementStrategy::Pinned && service.placement.pinned_hosts.is_empty() {
      bail!("service '{name}' uses placement strategy 'pinned' with no hosts listed");
    }
  }

  // Cycle detection reuses the same resolver the executor orders by —
  // a config that can't be topologically sorted is a configuration
  // error, not something the planner or observer should ever see.
  resolver::resolve_order(&environment.services).context("dependency cycle")?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expands_known_env_var() {
    unsafe { std::env::set_var("TAKO_TEST_CONFIG_VAR", "  value  ") };
    let out = expand_env_refs("host: ${TAKO_TEST_CONFIG_VAR}").unwrap();
    assert_eq!(out, "host: value");
    unsafe { std::env::remove_var("TAKO_TEST_CONFIG_VAR") };
  }

  #[test]
  fn errors_on_unset_env_var() {
    let err = expand_env_refs("host: ${TAKO_DEFINITELY_UNSET_VAR}").unwrap_err();
    assert!(err.to_string().contains("TAKO_DEFINITELY_UNSET_VAR"));
  }

  #[test]
  fn leaves_text_without_references_untouched() {
    let out = expand_env_refs("plain text, no refs").unwrap();
    assert_eq!(out, "plain text, no refs");
  }
}
