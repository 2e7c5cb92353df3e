//! Built-in question bank used when no TOML catalog is configured, and by
//! tests. Mirrors the shape of the production commuter-survey catalog:
//! consent, characteristic questions, then trip details with placeholders
//! and a conditional branch.

use crate::catalog::{
  DisplayIf, InputType, Question, QuestionOption, QuestionType, SectionId, ValidationRule,
};
use crate::validate::PHONE_PATTERN;

/// Question code of the fixed consent answer submitted when a session is
/// minted.
pub const CONSENT_QUESTION: &str = "PS001";

fn opt(label: &str) -> QuestionOption {
  QuestionOption { label: label.into(), info: None }
}

/// Minimal set of built-in questions that keep the engine useful even
/// without an external catalog file.
pub fn seed_catalog() -> Vec<Question> {
  vec![
    Question {
      code: "PS001".into(),
      section: SectionId::Persetujuan,
      text: "Apakah Anda bersedia berpartisipasi dalam survei ini?".into(),
      kind: QuestionType::Select,
      multiple: false,
      options: vec![opt("Setuju"), opt("Tidak Setuju")],
      min_selections: None,
      validation: ValidationRule { required: true, ..Default::default() },
      instruction: None,
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "KR001".into(),
      section: SectionId::Karakteristik,
      text: "Jenis kelamin".into(),
      kind: QuestionType::Select,
      multiple: false,
      options: vec![opt("Laki-laki"), opt("Perempuan")],
      min_selections: None,
      validation: ValidationRule { required: true, ..Default::default() },
      instruction: None,
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "KR002".into(),
      section: SectionId::Karakteristik,
      text: "Usia Anda saat ini (tahun)".into(),
      kind: QuestionType::Text,
      multiple: false,
      options: vec![],
      min_selections: None,
      validation: ValidationRule {
        required: true,
        input_type: Some(InputType::Number),
        min: Some(10),
        max: Some(100),
        ..Default::default()
      },
      instruction: None,
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "S001".into(),
      section: SectionId::Survei,
      text: "Nomor HP yang dapat dihubungi".into(),
      kind: QuestionType::Text,
      multiple: false,
      options: vec![],
      min_selections: None,
      validation: ValidationRule {
        required: true,
        pattern: Some(PHONE_PATTERN.into()),
        ..Default::default()
      },
      instruction: Some("Contoh: 081234567890 atau +6281234567890".into()),
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "S002".into(),
      section: SectionId::Survei,
      text: "Apakah Anda berpindah moda dalam perjalanan ini?".into(),
      kind: QuestionType::Select,
      multiple: false,
      options: vec![opt("Ya"), opt("Tidak")],
      min_selections: None,
      validation: ValidationRule { required: true, ..Default::default() },
      instruction: None,
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "S002A".into(),
      section: SectionId::Survei,
      text: "Stasiun keberangkatan Anda".into(),
      kind: QuestionType::Text,
      multiple: false,
      options: vec![],
      min_selections: None,
      validation: ValidationRule { required: true, ..Default::default() },
      instruction: None,
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "S003".into(),
      section: SectionId::Survei,
      text: "Berapa lama perjalanan Anda dari {$S002A} sampai tujuan akhir?".into(),
      kind: QuestionType::Text,
      multiple: false,
      options: vec![],
      min_selections: None,
      validation: ValidationRule {
        required: false,
        input_type: Some(InputType::Number),
        min: Some(0),
        ..Default::default()
      },
      instruction: Some("Dalam menit".into()),
      additional_info: None,
      display_if: None,
    },
    Question {
      code: "S004".into(),
      section: SectionId::Survei,
      text: "Di stasiun mana Anda berpindah moda?".into(),
      kind: QuestionType::Select,
      multiple: false,
      options: vec![opt("Manggarai"), opt("Tanah Abang"), opt("Duri")],
      min_selections: None,
      validation: ValidationRule::default(),
      instruction: None,
      additional_info: None,
      display_if: Some(DisplayIf { code: "S002".into(), equals: "Ya".into() }),
    },
    Question {
      code: "S005".into(),
      section: SectionId::Survei,
      text: "Moda apa saja yang Anda gunakan hari ini?".into(),
      kind: QuestionType::Select,
      multiple: true,
      options: vec![
        opt("KRL"),
        opt("Bus"),
        opt("Angkot"),
        QuestionOption { label: "Ojek daring".into(), info: Some("Gojek, Grab, dsb.".into()) },
      ],
      min_selections: Some(2),
      validation: ValidationRule { required: true, ..Default::default() },
      instruction: Some("Paling sedikit dua pilihan".into()),
      additional_info: None,
      display_if: None,
    },
  ]
}
