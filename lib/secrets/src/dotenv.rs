use indexmap::IndexMap;

/// Parses a `.tako/secrets`-style file: `KEY=value` per line, blank
/// lines and `#`-prefixed comments ignored, no quoting grammar beyond
/// a single pair of surrounding double quotes (stripped, no escapes
/// processed inside — if you need a literal `"`, don't quote).
pub fn parse(content: &str) -> IndexMap<String, String> {
  let mut vars = IndexMap::new();
  for line in content.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let Some((key, value)) = line.split_once('=') else { continue };
    let key = key.trim();
    if key.is_empty() {
      continue;
    }
    let value = value.trim();
    let value = value
      .strip_prefix('"')
      .and_then(|v| v.strip_suffix('"'))
      .unwrap_or(value);
    vars.insert(key.to_string(), value.to_string());
  }
  vars
}

/// Serializes `vars` back to the same grammar, with keys sorted so the
/// output is deterministic across runs (useful for diffing and for
/// change-hashing the materialized env file).
pub fn serialize(vars: &IndexMap<String, String>) -> String {
  let mut keys: Vec<&String> = vars.keys().collect();
  keys.sort();

  let mut out = String::new();
  out.push_str("# generated by tako — do not edit, will be overwritten\n");
  for key in keys {
    let value = &vars[key];
    if value.contains(['\n', '#']) || value.trim() != value {
      out.push_str(key);
      out.push('=');
      out.push('"');
      out.push_str(&value.replace('"', "\\\""));
      out.push_str("\"\n");
    } else {
      out.push_str(key);
      out.push('=');
      out.push_str(value);
      out.push('\n');
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_simple_assignments_and_skips_comments() {
    let content = "# comment\nFOO=bar\n\nBAZ=qux\n";
    let vars = parse(content);
    assert_eq!(vars.get("FOO"), Some(&"bar".to_string()));
    assert_eq!(vars.get("BAZ"), Some(&"qux".to_string()));
    assert_eq!(vars.len(), 2);
  }

  #[test]
  fn strips_surrounding_double_quotes() {
    let vars = parse("GREETING=\"hello world\"\n");
    assert_eq!(vars.get("GREETING"), Some(&"hello world".to_string()));
  }

  #[test]
  fn serialize_sorts_keys_and_quotes_values_with_whitespace() {
    let mut vars = IndexMap::new();
    vars.insert("Z".to_string(), "plain".to_string());
    vars.insert("A".to_string(), "has space".to_string());
    let out = serialize(&vars);
    let a_pos = out.find("A=").unwrap();
    let z_pos = out.find("Z=").unwrap();
    assert!(a_pos < z_pos);
    assert!(out.contains("A=\"has space\""));
  }
}
