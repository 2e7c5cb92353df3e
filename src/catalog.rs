//! Question catalog: the ordered, immutable list of question definitions the
//! engine runs against. Pure data plus lookup/rendering helpers; all answer
//! state lives in the store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::util::fill_placeholders;

/// Top-level survey phases. Consent is untimed; the other two accrue time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
  Persetujuan,
  Karakteristik,
  Survei,
}

impl SectionId {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Persetujuan => "persetujuan",
      Self::Karakteristik => "karakteristik",
      Self::Survei => "survei",
    }
  }

  /// Only the characteristic and trip-detail sections are timed.
  pub fn is_timed(&self) -> bool {
    matches!(self, Self::Karakteristik | Self::Survei)
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "persetujuan" => Some(Self::Persetujuan),
      "karakteristik" => Some(Self::Karakteristik),
      "survei" => Some(Self::Survei),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
  Text,
  Select,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
  Number,
}

/// Declared validation constraints, applied in order by the validation engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
  #[serde(default)] pub required: bool,
  /// Regex source matched verbatim. A pattern that fails to compile is
  /// treated as no constraint (fail-open, logged).
  #[serde(default)] pub pattern: Option<String>,
  #[serde(default)] pub input_type: Option<InputType>,
  #[serde(default)] pub min: Option<i64>,
  #[serde(default)] pub max: Option<i64>,
}

/// One selectable option; `info` carries auxiliary explanatory text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionOption {
  pub label: String,
  #[serde(default)] pub info: Option<String>,
}

/// Conditional-display hint: show this question only when another answer
/// equals a given value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayIf {
  pub code: String,
  pub equals: String,
}

/// Immutable question definition.
///
/// `min_selections` is declared explicitly; the legacy behavior of deriving
/// a two-selection minimum from an instruction string containing
/// "Paling sedikit" was a smell and is not reproduced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub code: String,
  pub section: SectionId,
  /// Prompt template; may contain `{$name}` placeholder tokens.
  pub text: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  #[serde(default)] pub multiple: bool,
  #[serde(default)] pub options: Vec<QuestionOption>,
  #[serde(default)] pub min_selections: Option<usize>,
  #[serde(default)] pub validation: ValidationRule,
  #[serde(default)] pub instruction: Option<String>,
  #[serde(default)] pub additional_info: Option<String>,
  #[serde(default)] pub display_if: Option<DisplayIf>,
}

impl Question {
  /// Render prompt text against the current answer snapshot.
  pub fn render_text(&self, answers: &HashMap<String, String>) -> String {
    let pairs: Vec<(&str, &str)> = answers
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
      .collect();
    fill_placeholders(&self.text, &pairs)
  }

  /// Selection-type answers are atomic discrete choices and commit without
  /// a debounce window.
  pub fn commits_immediately(&self) -> bool {
    self.kind == QuestionType::Select
  }
}

/// Ordered catalog with O(1) code lookup. Duplicated codes keep the first
/// definition; later ones are dropped with a warning.
#[derive(Clone, Debug)]
pub struct Catalog {
  questions: Vec<Question>,
  by_code: HashMap<String, usize>,
}

impl Catalog {
  pub fn new(questions: Vec<Question>) -> Self {
    let mut kept: Vec<Question> = Vec::with_capacity(questions.len());
    let mut by_code = HashMap::new();
    for q in questions {
      if by_code.contains_key(&q.code) {
        tracing::warn!(target: "survei_engine", code = %q.code, "Duplicate question code in catalog; keeping first");
        continue;
      }
      by_code.insert(q.code.clone(), kept.len());
      kept.push(q);
    }
    Self { questions: kept, by_code }
  }

  pub fn get(&self, code: &str) -> Option<&Question> {
    self.by_code.get(code).map(|&i| &self.questions[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = &Question> {
    self.questions.iter()
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.questions.is_empty()
  }

  pub fn section_questions(&self, section: SectionId) -> Vec<&Question> {
    self.questions.iter().filter(|q| q.section == section).collect()
  }

  /// Evaluate a question's conditional-display hint against current answers.
  /// Questions without a hint are always visible.
  pub fn is_visible(&self, q: &Question, answers: &HashMap<String, String>) -> bool {
    match &q.display_if {
      None => true,
      Some(rule) => answers.get(&rule.code).map(|v| v == &rule.equals).unwrap_or(false),
    }
  }
}
