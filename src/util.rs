//! Small utility helpers used across modules.

/// Replace `{$name}` placeholder tokens in question text with provided values.
/// Unknown placeholders are left as-is so a half-configured catalog is still
/// renderable. Intentionally simple (no nested/conditional logic).
pub fn fill_placeholders(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{${}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Split a comma-joined multi-select value into its non-empty selections.
pub fn split_selections(raw: &str) -> Vec<&str> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::{fill_placeholders, split_selections};

  #[test]
  fn fills_known_placeholders_and_keeps_unknown() {
    let out = fill_placeholders(
      "Dari {$origin} menuju {$destination}?",
      &[("origin", "Bekasi")],
    );
    assert_eq!(out, "Dari Bekasi menuju {$destination}?");
  }

  #[test]
  fn splits_and_drops_empty_selections() {
    assert_eq!(split_selections("Bus, , Kereta,"), vec!["Bus", "Kereta"]);
    assert!(split_selections("  ").is_empty());
  }
}
