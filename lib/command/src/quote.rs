//! The single approved way to interpolate a dynamic string into a shell
//! command bound for a remote host (§4.1: "every caller that
//! interpolates user data must quote via a shared escape routine that
//! single-quote-wraps and escapes embedded single quotes").
//!
//! Every module that builds a remote command line — the cluster
//! manager, the executor, the image distributor — goes through this
//! function rather than formatting strings directly, so there is one
//! place to audit for injection.
//!
//! Unlike the `shell-escape` crate (which only quotes when a string
//! contains a character outside its "safe" set), this always wraps in
//! single quotes, matching the invariant tests in spec §8 literally.

/// Single-quote wraps `arg`, escaping any embedded single quote as
/// `'\''` (close quote, escaped quote, reopen quote).
pub fn quote(arg: &str) -> String {
  let mut out = String::with_capacity(arg.len() + 2);
  out.push('\'');
  for ch in arg.chars() {
    if ch == '\'' {
      out.push_str("'\\''");
    } else {
      out.push(ch);
    }
  }
  out.push('\'');
  out
}

/// Quotes every argument and joins them with spaces, for building a
/// complete remote command line from argv-style pieces.
pub fn quote_args<I, S>(args: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  args
    .into_iter()
    .map(|a| quote(a.as_ref()))
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_word_is_still_wrapped() {
    assert_eq!(quote("hello"), "'hello'");
  }

  #[test]
  fn embedded_single_quote_is_escaped() {
    assert_eq!(quote("it's a test"), "'it'\\''s a test'");
  }

  #[test]
  fn injection_attempt_is_neutralized() {
    let malicious = "x'; rm -rf / #";
    let quoted = quote(malicious);
    // The embedded quote is escaped, not left to close our wrapper early.
    assert_eq!(quoted, "'x'\\''; rm -rf / #'");
  }

  #[test]
  fn join_multiple_args() {
    assert_eq!(quote_args(["a", "b c"]), "'a' 'b c'");
  }
}
