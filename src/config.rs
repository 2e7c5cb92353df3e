//! Engine configuration and TOML catalog loading.
//!
//! The question bank can be supplied as a TOML file (`SURVEY_CATALOG_PATH`);
//! on any parsing/IO error we fall back to the built-in seed catalog so the
//! engine is always usable.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::catalog::{Catalog, Question};
use crate::seeds::seed_catalog;

/// Fixed debounce window for free-text and numeric commits.
pub const DEFAULT_DEBOUNCE_MS: u64 = 4000;

#[derive(Clone, Debug)]
pub struct EngineConfig {
  /// Debounce window before a text/number edit is considered settled.
  pub debounce: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS) }
  }
}

impl EngineConfig {
  /// Read config from env. SYNC_DEBOUNCE_MS overrides the 4000 ms default;
  /// anything unparsable keeps the default.
  pub fn from_env() -> Self {
    let debounce = std::env::var("SYNC_DEBOUNCE_MS")
      .ok()
      .and_then(|v| v.parse::<u64>().ok())
      .map(Duration::from_millis)
      .unwrap_or_else(|| Duration::from_millis(DEFAULT_DEBOUNCE_MS));
    Self { debounce }
  }
}

/// Expected TOML schema: a top-level `questions` array of tables.
#[derive(Debug, Deserialize)]
struct CatalogFile {
  #[serde(default)]
  questions: Vec<Question>,
}

/// Parse a catalog from TOML text.
pub fn catalog_from_toml(raw: &str) -> Result<Catalog, toml::de::Error> {
  let file: CatalogFile = toml::from_str(raw)?;
  Ok(Catalog::new(file.questions))
}

/// Attempt to load the catalog from SURVEY_CATALOG_PATH. On any
/// parsing/IO error, falls back to the built-in seeds.
pub fn load_catalog_from_env() -> Catalog {
  let Some(path) = std::env::var("SURVEY_CATALOG_PATH").ok() else {
    return Catalog::new(seed_catalog());
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match catalog_from_toml(&s) {
      Ok(cat) => {
        info!(target: "survei_engine", %path, questions = cat.len(), "Loaded question catalog (TOML)");
        cat
      }
      Err(e) => {
        error!(target: "survei_engine", %path, error = %e, "Failed to parse TOML catalog; using seeds");
        Catalog::new(seed_catalog())
      }
    },
    Err(e) => {
      error!(target: "survei_engine", %path, error = %e, "Failed to read TOML catalog file; using seeds");
      Catalog::new(seed_catalog())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::catalog_from_toml;
  use crate::catalog::{QuestionType, SectionId};

  #[test]
  fn parses_minimal_toml_catalog() {
    let raw = r#"
      [[questions]]
      code = "S001"
      section = "survei"
      text = "Nomor HP"
      type = "text"

      [questions.validation]
      required = true
      pattern = "^(0[0-9]{7,14}|\\+62[0-9]{7,12})$"

      [[questions]]
      code = "S005"
      section = "survei"
      text = "Moda"
      type = "select"
      multiple = true
      min_selections = 2
      options = [{ label = "KRL" }, { label = "Bus", info = "Transjakarta" }]
    "#;
    let cat = catalog_from_toml(raw).expect("parse catalog");
    assert_eq!(cat.len(), 2);
    let q = cat.get("S001").expect("question");
    assert_eq!(q.section, SectionId::Survei);
    assert!(q.validation.required);
    let m = cat.get("S005").expect("question");
    assert_eq!(m.kind, QuestionType::Select);
    assert_eq!(m.min_selections, Some(2));
    assert_eq!(m.options[1].info.as_deref(), Some("Transjakarta"));
  }

  #[test]
  fn bad_toml_is_an_error() {
    assert!(catalog_from_toml("questions = 3").is_err());
  }
}
