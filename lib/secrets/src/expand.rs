use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;

/// Commands a `$(...)` substitution is allowed to invoke. Anything else
/// is rejected outright — secret values must never be able to shell out
/// to arbitrary programs just because they appear in a config file an
/// attacker can edit.
pub const ALLOWED_SUBSTITUTION_COMMANDS: &[&str] =
  &["tako", "op", "bw", "aws", "gcloud", "vault", "doppler"];

const MAX_EXPANSION_DEPTH: usize = 16;

/// Expands every value in `vars` against the full scope (so `BASE_URL`
/// can reference `HOST`, `HOST` can come from a chained scope further
/// up, etc.), running allowlisted `$(cmd ...)` substitutions as needed.
pub async fn expand_all(
  vars: &IndexMap<String, String>,
) -> Result<IndexMap<String, String>> {
  let mut resolved = IndexMap::new();
  for key in vars.keys() {
    let value = expand_one(key, vars, &mut resolved, 0).await?;
    resolved.insert(key.clone(), value);
  }
  Ok(resolved)
}

fn expand_one<'a>(
  key: &'a str,
  source: &'a IndexMap<String, String>,
  resolved: &'a mut IndexMap<String, String>,
  depth: usize,
) -> std::pin::Pin<Box<dyn Future<Output = Result<String>> + 'a>> {
  Box::pin(async move {
    if let Some(existing) = resolved.get(key) {
      return Ok(existing.clone());
    }
    if depth > MAX_EXPANSION_DEPTH {
      return Err(anyhow!(
        "variable expansion exceeded depth {MAX_EXPANSION_DEPTH} resolving '{key}' — likely a reference cycle"
      ));
    }
    let raw = source
      .get(key)
      .ok_or_else(|| anyhow!("referenced variable '{key}' is not defined"))?;

    let with_vars = expand_variable_refs(raw, source, resolved, depth).await?;
    let with_commands = expand_command_substitutions(&with_vars).await?;
    resolved.insert(key.to_string(), with_commands.clone());
    Ok(with_commands)
  })
}

/// Replaces `${VAR}` and bare `$VAR` references with their expanded
/// values, recursively.
async fn expand_variable_refs(
  input: &str,
  source: &IndexMap<String, String>,
  resolved: &mut IndexMap<String, String>,
  depth: usize,
) -> Result<String> {
  let mut out = String::with_capacity(input.len());
  let mut chars = input.char_indices().peekable();

  while let Some((_, c)) = chars.next() {
    if c != '$' {
      out.push(c);
      continue;
    }
    match chars.peek().copied() {
      Some((_, '{')) => {
        chars.next();
        let mut name = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            closed = true;
            break;
          }
          name.push(c);
        }
        if !closed {
          return Err(anyhow!("unterminated '${{' in value"));
        }
        let expanded =
          Box::pin(expand_one(&name, source, resolved, depth + 1)).await?;
        out.push_str(&expanded);
      }
      Some((_, '(')) => {
        // Command substitutions are handled in a separate pass after
        // variable refs, so pass `$(` through untouched here.
        out.push('$');
      }
      Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {
        let mut name = String::new();
        while let Some((_, c)) = chars.peek().copied() {
          if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
          } else {
            break;
          }
        }
        let expanded =
          Box::pin(expand_one(&name, source, resolved, depth + 1)).await?;
        out.push_str(&expanded);
      }
      _ => out.push('$'),
    }
  }

  Ok(out)
}

/// Replaces every `$(command args...)` with the stdout of running
/// `command` (trimmed of trailing newline), provided `command` is on
/// [`ALLOWED_SUBSTITUTION_COMMANDS`].
async fn expand_command_substitutions(input: &str) -> Result<String> {
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(start) = rest.find("$(") {
    out.push_str(&rest[..start]);
    let after_open = &rest[start + 2..];
    let end = after_open
      .find(')')
      .ok_or_else(|| anyhow!("unterminated '$(' in value"))?;
    let command_str = &after_open[..end];

    let first_word = command_str.split_whitespace().next().unwrap_or("");
    if !ALLOWED_SUBSTITUTION_COMMANDS.contains(&first_word) {
      return Err(anyhow!(
        "command substitution '$({command_str})' uses disallowed command \
         '{first_word}'; only {ALLOWED_SUBSTITUTION_COMMANDS:?} are permitted"
      ));
    }

    let output = command::run_standard_command(command_str, None)
      .await;
    if !output.success() {
      return Err(anyhow!(
        "command substitution '$({command_str})' exited with failure: {}",
        output.stderr.trim()
      ))
      .context("secret command substitution failed");
    }
    out.push_str(output.stdout.trim_end_matches('\n'));

    rest = &after_open[end + 1..];
  }
  out.push_str(rest);
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn expands_curly_and_bare_variable_refs() {
    let mut vars = IndexMap::new();
    vars.insert("HOST".to_string(), "db.internal".to_string());
    vars.insert("PORT".to_string(), "5432".to_string());
    vars.insert(
      "DATABASE_URL".to_string(),
      "postgres://${HOST}:$PORT/app".to_string(),
    );

    let resolved = expand_all(&vars).await.unwrap();
    assert_eq!(
      resolved.get("DATABASE_URL").unwrap(),
      "postgres://db.internal:5432/app"
    );
  }

  #[tokio::test]
  async fn detects_reference_cycles() {
    let mut vars = IndexMap::new();
    vars.insert("A".to_string(), "${B}".to_string());
    vars.insert("B".to_string(), "${A}".to_string());

    let err = expand_all(&vars).await.unwrap_err();
    assert!(format!("{err:#}").contains("depth"));
  }

  #[tokio::test]
  async fn rejects_disallowed_command_substitution() {
    let mut vars = IndexMap::new();
    vars.insert("EVIL".to_string(), "$(curl http://evil.example)".to_string());

    let err = expand_all(&vars).await.unwrap_err();
    assert!(format!("{err:#}").contains("disallowed command"));
  }

  #[tokio::test]
  async fn runs_allowlisted_command_substitution() {
    // `tako` itself is allowlisted; since it's not actually on PATH in
    // tests, assert the failure path reports the *execution* failing
    // rather than the allowlist rejecting it.
    let mut vars = IndexMap::new();
    vars.insert(
      "TOKEN".to_string(),
      "$(tako secrets print-test-token)".to_string(),
    );
    let err = expand_all(&vars).await.unwrap_err();
    assert!(!format!("{err:#}").contains("disallowed command"));
  }
}
