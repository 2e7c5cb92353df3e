//! Answer store: the authoritative in-memory mapping from question code to
//! answer value and validation error.
//!
//! This module owns all mutation of that state:
//!   - `set` applies an edit optimistically and mirrors the validation result
//!   - `rollback` restores the last committed value after a failed save
//!   - `hydrate` replays prior remote responses on mount
//!
//! Invariants:
//!   - a code is present in `answers` iff a non-empty value was provided
//!   - a code is present in `errors` iff the current value fails validation
//!   - writes happen only when content actually differs, so downstream
//!     consumers never see redundant churn

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::catalog::{Catalog, Question};
use crate::client::ResponseItem;
use crate::validate::validate;

/// Result of one `set` call, used by the sync coordinator to decide whether
/// anything needs to happen downstream.
#[derive(Clone, Debug)]
pub struct SetOutcome {
    /// False when the edit produced no observable state change (idempotence).
    pub changed: bool,
    /// True when the edit cleared the answer (key removed).
    pub cleared: bool,
    /// Current validation error for this code, if any.
    pub error: Option<String>,
}

/// Progress summary for a supplied authoritative question list. `total` is
/// the catalog size, not the number of keys ever touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionStatus {
    pub answered: usize,
    pub blank: usize,
    pub error: usize,
    pub total: usize,
}

#[derive(Default)]
pub struct AnswerStore {
    answers: RwLock<HashMap<String, String>>,
    errors: RwLock<HashMap<String, String>>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, code: &str) -> Option<String> {
        self.answers.read().await.get(code).cloned()
    }

    pub async fn error(&self, code: &str) -> Option<String> {
        self.errors.read().await.get(code).cloned()
    }

    /// Clone of the full answer map, for placeholder rendering and
    /// visibility checks.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.answers.read().await.clone()
    }

    pub async fn is_answered(&self, code: &str) -> bool {
        self.answers
            .read()
            .await
            .get(code)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }

    /// Apply an edit optimistically and mirror the validation verdict into
    /// the error map. Idempotent: repeating the same edit reports
    /// `changed: false` and writes nothing.
    #[instrument(level = "debug", skip(self, q, raw), fields(code = %q.code))]
    pub async fn set(&self, q: &Question, raw: &str) -> SetOutcome {
        let verdict = validate(q, raw);
        let cleared = raw.trim().is_empty();
        let new_error = verdict.err();

        let mut answers = self.answers.write().await;
        let mut errors = self.errors.write().await;

        let value_changed = if cleared {
            answers.remove(&q.code).is_some()
        } else if answers.get(&q.code).map(String::as_str) != Some(raw) {
            answers.insert(q.code.clone(), raw.to_string());
            true
        } else {
            false
        };

        let error_changed = if errors.get(&q.code) != new_error.as_ref() {
            match &new_error {
                Some(msg) => errors.insert(q.code.clone(), msg.clone()),
                None => errors.remove(&q.code),
            };
            true
        } else {
            false
        };

        let changed = value_changed || error_changed;
        if changed {
            debug!(target: "survei_engine", code = %q.code, cleared, has_error = new_error.is_some(), "Answer state updated");
        }
        SetOutcome { changed, cleared, error: new_error }
    }

    /// Restore the last committed value after a genuine save failure, then
    /// re-mirror validation for the restored state.
    #[instrument(level = "debug", skip(self, q, committed), fields(code = %q.code))]
    pub async fn rollback(&self, q: &Question, committed: Option<String>) {
        let restored = committed.unwrap_or_default();
        let verdict = validate(q, &restored);

        let mut answers = self.answers.write().await;
        let mut errors = self.errors.write().await;

        if restored.trim().is_empty() {
            answers.remove(&q.code);
        } else {
            answers.insert(q.code.clone(), restored);
        }
        match verdict {
            Ok(()) => {
                errors.remove(&q.code);
            }
            Err(msg) => {
                errors.insert(q.code.clone(), msg);
            }
        }
    }

    /// Replay prior remote responses into the store before any interaction.
    /// Hydrated values are validated against the catalog so invalid ones
    /// surface errors immediately; codes unknown to the catalog are kept
    /// verbatim.
    #[instrument(level = "info", skip_all, fields(responses = responses.len()))]
    pub async fn hydrate(&self, catalog: &Catalog, responses: &[ResponseItem]) {
        let mut answers = self.answers.write().await;
        let mut errors = self.errors.write().await;
        for item in responses {
            if item.valid_response.trim().is_empty() {
                continue;
            }
            answers.insert(item.question_code.clone(), item.valid_response.clone());
            if let Some(q) = catalog.get(&item.question_code) {
                match validate(q, &item.valid_response) {
                    Ok(()) => {
                        errors.remove(&item.question_code);
                    }
                    Err(msg) => {
                        errors.insert(item.question_code.clone(), msg);
                    }
                }
            }
        }
    }

    /// Completion summary against the authoritative catalog. The legacy
    /// implementation derived `total` from keys ever written into the
    /// answer map; we count the catalog instead (see the test below for
    /// the divergence).
    pub async fn completion_status(&self, catalog: &Catalog) -> CompletionStatus {
        let answers = self.answers.read().await;
        let errors = self.errors.read().await;
        let mut status = CompletionStatus { answered: 0, blank: 0, error: 0, total: catalog.len() };
        for q in catalog.iter() {
            if errors.contains_key(&q.code) {
                status.error += 1;
            } else if answers.get(&q.code).map(|v| !v.trim().is_empty()).unwrap_or(false) {
                status.answered += 1;
            } else {
                status.blank += 1;
            }
        }
        status
    }
}
