//! Engine error taxonomy.
//!
//! Format (client-side validation) failures are plain values inside the
//! Answer Store boundary and never appear here. `EngineError` covers the
//! remote/save/session/storage side: what §7-style UIs surface as transient
//! save messages or blocking session alerts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// An operation that requires a minted session ran without one, or
  /// without the remote collaborator that mints them.
  #[error("no active session")]
  NoSession,

  /// The request was cancelled on purpose (unmount/teardown). Expected;
  /// callers swallow this instead of surfacing it to the respondent.
  #[error("request aborted")]
  Aborted,

  /// The remote accepted the connection but rejected the operation.
  #[error("save failed: {0}")]
  Save(String),

  /// Access code was refused by the collaborator.
  #[error("access code rejected: {0}")]
  AccessDenied(String),

  /// Transport-level failure (DNS, timeout, connection reset).
  #[error("http: {0}")]
  Http(String),

  /// Durable local storage could not be read or written.
  #[error("storage: {0}")]
  Storage(String),

  /// An edit referenced a code the catalog does not know.
  #[error("unknown question code: {0}")]
  UnknownQuestion(String),
}

impl EngineError {
  /// True for failures that should roll back optimistic answer state.
  /// Aborts are expected teardown noise, not genuine failures.
  pub fn is_genuine_failure(&self) -> bool {
    !matches!(self, EngineError::Aborted)
  }
}

impl From<reqwest::Error> for EngineError {
  fn from(e: reqwest::Error) -> Self {
    EngineError::Http(e.to_string())
  }
}
