//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Values are inserted in a single pass, so a value containing `{key}` is never expanded again.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  'outer: while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open..];
    for (k, v) in pairs {
      let needle = format!("{{{}}}", k);
      if after.starts_with(&needle) {
        out.push_str(v);
        rest = &after[needle.len()..];
        continue 'outer;
      }
    }
    out.push('{');
    rest = &after[1..];
  }
  out.push_str(rest);
  out
}

/// First `max` characters of `s`, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let head = truncate_chars(s, max);
  if head.len() == s.len() { s.to_string() } else { format!("{}… ({} bytes total)", head, s.len()) }
}
