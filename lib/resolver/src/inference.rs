/// Env-key substrings that make a value-equals-name match meaningful
/// rather than a coincidence (§4.7 Inference, third bullet).
const HOST_LIKE_KEY_MARKERS: &[&str] =
  &["host", "server", "url", "endpoint", "address", "addr"];

/// Whether `env_value` (declared under `env_key`) plausibly references
/// `other` — another service in the same environment — per the three
/// pattern families in §4.7.
pub fn value_references_service(
  env_key: &str,
  env_value: &str,
  other: &str,
) -> bool {
  let upper_value = env_value.to_uppercase();
  let upper_other = other.to_uppercase();
  if upper_value.contains(&format!("{upper_other}_URL"))
    || upper_value.contains(&format!("{upper_other}_HOST"))
    || upper_value.contains(&format!("{upper_other}_PORT"))
    || upper_value.contains(&format!("{upper_other}:"))
  {
    return true;
  }

  let lower_value = env_value.to_lowercase();
  let lower_other = other.to_lowercase();
  if lower_value.contains(&format!("://{lower_other}"))
    || lower_value.contains(&format!("@{lower_other}:"))
    || lower_value.contains(&format!("@{lower_other}/"))
  {
    return true;
  }

  if lower_value == lower_other {
    let lower_key = env_key.to_lowercase();
    return HOST_LIKE_KEY_MARKERS.iter().any(|marker| lower_key.contains(marker));
  }

  false
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_upper_suffix_patterns() {
    assert!(value_references_service("DATABASE_URL", "postgres://DB_URL/app", "db"));
    assert!(value_references_service("X", "REDIS_HOST=cache", "redis"));
    assert!(value_references_service("X", "PGPORT=api:5432", "api"));
  }

  #[test]
  fn detects_lower_connection_string_patterns() {
    assert!(value_references_service(
      "DATABASE_URL",
      "postgres://postgres:5432/app",
      "postgres"
    ));
    assert!(value_references_service("REDIS_URL", "redis://user@cache:6379", "cache"));
  }

  #[test]
  fn requires_host_like_key_for_bare_equality() {
    assert!(value_references_service("API_HOST", "api", "api"));
    assert!(!value_references_service("MYSQL_DATABASE", "ghost", "ghost"));
  }
}
