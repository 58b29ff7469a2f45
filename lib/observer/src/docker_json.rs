use anyhow::{Context, bail};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServiceLsEntry {
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "Replicas")]
  pub replicas: String,
  #[serde(rename = "Image")]
  pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct PsEntry {
  #[serde(rename = "ID")]
  pub id: String,
  #[serde(rename = "Names")]
  pub names: String,
  #[serde(rename = "Image")]
  pub image: String,
}

/// Parses lines of `docker ... --format '{{json .}}'` output, one JSON
/// object per line (not a JSON array).
pub fn parse_ndjson<T: for<'de> Deserialize<'de>>(stdout: &str) -> anyhow::Result<Vec<T>> {
  stdout
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| serde_json::from_str(line).with_context(|| format!("failed to parse docker json line: {line}")))
    .collect()
}

/// Splits a `docker service ls` replicas field (`"r/d"`) into
/// `(running, desired)`.
pub fn parse_replica_field(field: &str) -> anyhow::Result<(u32, u32)> {
  let (running, desired) = field
    .split_once('/')
    .with_context(|| format!("unexpected replicas field shape: '{field}'"))?;
  let running: u32 = running
    .trim()
    .parse()
    .with_context(|| format!("non-numeric running replica count in '{field}'"))?;
  let desired: u32 = desired
    .trim()
    .parse()
    .with_context(|| format!("non-numeric desired replica count in '{field}'"))?;
  Ok((running, desired))
}

/// Strips `prefix` and a trailing `_N` replica index from a container
/// name, returning the bare logical service name (§4.8: "parse replica
/// index from the trailing `_N` token").
pub fn strip_replica_suffix(name: &str) -> anyhow::Result<&str> {
  let (base, index) = name
    .rsplit_once('_')
    .with_context(|| format!("container name '{name}' has no replica index"))?;
  if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
    bail!("container name '{name}' does not end in a numeric replica index");
  }
  Ok(base)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_replica_field() {
    assert_eq!(parse_replica_field("2/3").unwrap(), (2, 3));
  }

  #[test]
  fn strips_trailing_replica_index() {
    assert_eq!(strip_replica_suffix("acme_prod_web_1").unwrap(), "acme_prod_web");
  }

  #[test]
  fn rejects_non_numeric_suffix() {
    assert!(strip_replica_suffix("acme_prod_web").is_err());
  }
}
