//! Validation engine: pure checks of a candidate value against a question
//! definition. Rules run in order, first failure wins. No side effects;
//! the answer store is responsible for writing results into the error map.

use regex::Regex;
use tracing::warn;

use crate::catalog::{InputType, Question};
use crate::util::split_selections;

/// Reserved "don't know" answer. Valid for any question, bypasses format
/// validation, and commits immediately.
pub const DONT_KNOW: &str = "Tidak tahu";

/// Indonesian mobile numbers: local `0…` (8–15 digits) or `+62…` form.
pub const PHONE_PATTERN: &str = r"^(0[0-9]{7,14}|\+62[0-9]{7,12})$";

/// Validate `raw` against `q`. `Ok(())` means the value may be committed;
/// `Err` carries the human-readable reason shown next to the question.
pub fn validate(q: &Question, raw: &str) -> Result<(), String> {
  let value = raw.trim();

  if value == DONT_KNOW {
    return Ok(());
  }

  if value.is_empty() {
    if q.validation.required {
      return Err("Wajib diisi".into());
    }
    return Ok(());
  }

  if let Some(pattern) = &q.validation.pattern {
    match Regex::new(pattern) {
      Ok(re) => {
        if !re.is_match(value) {
          if pattern == PHONE_PATTERN {
            return Err("Nomor HP minimal 8 digit (awali 0 atau +62)".into());
          }
          return Err("Format jawaban tidak sesuai".into());
        }
      }
      Err(e) => {
        // Fail-open: an uncompilable declared pattern never blocks
        // submission, but we log the occurrence for diagnosis.
        warn!(target: "survei_engine", code = %q.code, error = %e, "Question pattern failed to compile; skipping check");
      }
    }
  }

  if q.validation.input_type == Some(InputType::Number) {
    let n: i64 = match value.parse() {
      Ok(n) => n,
      Err(_) => return Err("Harus berupa angka".into()),
    };
    if let Some(min) = q.validation.min {
      if n < min {
        return Err(format!("Minimal {}", min));
      }
    }
    if let Some(max) = q.validation.max {
      if n > max {
        return Err(format!("Maksimal {}", max));
      }
    }
  }

  if q.multiple {
    let selections = split_selections(value);
    let mut seen = std::collections::HashSet::new();
    if !selections.iter().all(|s| seen.insert(*s)) {
      return Err("Pilihan tidak boleh berulang".into());
    }
    if let Some(min) = q.min_selections {
      if selections.len() < min {
        return Err(format!("Pilih minimal {} opsi", min));
      }
    }
  }

  Ok(())
}
