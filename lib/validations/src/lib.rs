//! # Input Validation Module
//!
//! This module provides validation functions for user-supplied config
//! values (project, environment, service, and volume names; environment
//! variable names; webhook URLs) so malformed config is rejected at
//! load time rather than failing deep inside a `docker` invocation.

use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use regex::Regex;

/// Options to validate input strings to have certain properties.
/// This ensures only valid data can enter the system.
///
/// ## Usage
///
/// ```
/// use validations::{StringValidator, StringValidatorMatches};
/// StringValidator::default()
///   .min_length(1)
///   .max_length(100)
///   .matches(StringValidatorMatches::ResourceName)
///   .validate("web-app")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Default)]
pub struct StringValidator {
  /// Specify the minimum length of string.
  /// Setting `0` will effectively skip this validation.
  pub min_length: usize,
  /// Specify max length of string, or None to allow arbitrary length.
  pub max_length: Option<usize>,
  /// Skip the control character check.
  /// Most values should not contain these by default.
  pub skip_control_check: bool,
  /// Specify a pattern to validate the string contents.
  pub matches: Option<StringValidatorMatches>,
}

impl StringValidator {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  pub fn validate(&self, input: &str) -> anyhow::Result<()> {
    let len = input.len();

    if len < self.min_length {
      return Err(anyhow!(
        "Input too short. Must be at least {} characters.",
        self.min_length
      ));
    }

    if let Some(max_length) = self.max_length
      && len > max_length
    {
      return Err(anyhow!(
        "Input too long. Must be at most {max_length} characters."
      ));
    }

    if !self.skip_control_check {
      validate_no_control_chars(input)?;
    }

    if let Some(matches) = &self.matches {
      matches.validate(input)?
    }

    Ok(())
  }

  pub fn min_length(mut self, min_length: usize) -> StringValidator {
    self.min_length = min_length;
    self
  }

  pub fn max_length(
    mut self,
    max_length: impl Into<Option<usize>>,
  ) -> StringValidator {
    self.max_length = max_length.into();
    self
  }

  pub fn skip_control_check(mut self) -> StringValidator {
    self.skip_control_check = true;
    self
  }

  pub fn matches(
    mut self,
    matches: impl Into<Option<StringValidatorMatches>>,
  ) -> StringValidator {
    self.matches = matches.into();
    self
  }
}

pub enum StringValidatorMatches {
  /// - alphanumeric characters
  /// - underscores
  /// - hyphens
  /// - must start with an alphanumeric character
  ///
  /// Used for project, environment, service, and volume names — anything
  /// that ends up embedded in a docker object name or a qualified
  /// service name like `<project>-<environment>-<service>`.
  ResourceName,
  /// - alphanumeric characters
  /// - underscores
  /// - cannot start with a digit
  VariableName,
  /// - http or https URL.
  HttpUrl,
}

impl StringValidatorMatches {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  fn validate(&self, input: &str) -> anyhow::Result<()> {
    let validate = || match self {
      StringValidatorMatches::ResourceName => {
        static RESOURCE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = RESOURCE_NAME_REGEX.get_or_init(|| {
          Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$")
            .expect("Failed to initialize resource name regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Must start with an alphanumeric character and contain only alphanumeric characters, underscores, and hyphens"
          ))
        }
      }

      StringValidatorMatches::VariableName => {
        static VARIABLE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = VARIABLE_NAME_REGEX.get_or_init(|| {
          Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$")
            .expect("Failed to initialize variable name regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Only alphanumeric characters and underscores are allowed, and it cannot start with a digit"
          ))
        }
      }

      StringValidatorMatches::HttpUrl => {
        if !input.starts_with("http://")
          && !input.starts_with("https://")
        {
          return Err(anyhow!(
            "Input must start with http:// or https://"
          ));
        }
        url::Url::parse(input)
          .context("Failed to parse input as URL")
          .map(|_| ())
      }
    };
    validate().context("Invalid characters in input")
  }
}

/// Host paths a bind mount may never target (§7.1): the root filesystem,
/// the handful of pseudo-filesystems that would hand a container the
/// host's process/device namespace, the daemon socket, and anything
/// that `..`s its way out of wherever it claims to point.
const DISALLOWED_BIND_MOUNT_PATHS: &[&str] =
  &["/", "/etc", "/proc", "/sys", "/dev", "/var/run/docker.sock"];

/// Rejects a bind-mount source that is one of the disallowed host paths
/// (or a path beneath one of them), or that contains a `..` traversal
/// segment.
pub fn validate_bind_mount_source(path: &str) -> anyhow::Result<()> {
  if path.split('/').any(|segment| segment == "..") {
    return Err(anyhow!("bind mount source '{path}' may not contain '..'"));
  }
  for disallowed in DISALLOWED_BIND_MOUNT_PATHS {
    if path == *disallowed || path.starts_with(&format!("{disallowed}/")) {
      return Err(anyhow!("bind mount source '{path}' targets the disallowed path '{disallowed}'"));
    }
  }
  Ok(())
}

fn validate_no_control_chars(input: &str) -> anyhow::Result<()> {
  for (index, char) in input.chars().enumerate() {
    if char.is_control() {
      return Err(anyhow!(
        "Control character at index {index}. Input: \"{input}\""
      ));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resource_name_accepts_hyphenated_names() {
    StringValidator::default()
      .matches(StringValidatorMatches::ResourceName)
      .validate("web-app-1")
      .unwrap();
  }

  #[test]
  fn resource_name_rejects_leading_hyphen() {
    StringValidator::default()
      .matches(StringValidatorMatches::ResourceName)
      .validate("-web-app")
      .unwrap_err();
  }

  #[test]
  fn variable_name_rejects_leading_digit() {
    StringValidator::default()
      .matches(StringValidatorMatches::VariableName)
      .validate("1PORT")
      .unwrap_err();
  }

  #[test]
  fn http_url_requires_scheme() {
    StringValidator::default()
      .matches(StringValidatorMatches::HttpUrl)
      .validate("example.com")
      .unwrap_err();
    StringValidator::default()
      .matches(StringValidatorMatches::HttpUrl)
      .validate("https://example.com")
      .unwrap();
  }

  #[test]
  fn bind_mount_rejects_root_and_pseudo_filesystems() {
    validate_bind_mount_source("/").unwrap_err();
    validate_bind_mount_source("/etc/passwd").unwrap_err();
    validate_bind_mount_source("/var/run/docker.sock").unwrap_err();
  }

  #[test]
  fn bind_mount_rejects_traversal() {
    validate_bind_mount_source("/srv/app/../../etc").unwrap_err();
  }

  #[test]
  fn bind_mount_accepts_ordinary_paths() {
    validate_bind_mount_source("/srv/app/data").unwrap();
  }
}
