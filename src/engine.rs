//! Engine facade: wires the catalog, answer store, sync coordinator,
//! time tracker and section controller together behind one handle the
//! presentation shell talks to.
//!
//! Construction hands back an event receiver alongside the engine; the
//! shell drains it to drive UI updates (section changes, save failures,
//! session lifecycle).

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument, warn};

use crate::catalog::{Catalog, Question, SectionId};
use crate::client::{HttpSessionApi, SessionApi, SessionHandle};
use crate::config::{load_catalog_from_env, EngineConfig};
use crate::error::EngineError;
use crate::protocol::EngineEvent;
use crate::section::{SectionController, SwitchOutcome};
use crate::storage::LocalStore;
use crate::store::{AnswerStore, CompletionStatus, SetOutcome};
use crate::sync::SyncCoordinator;
use crate::timing::TimeTracker;

pub struct SurveyEngine {
  catalog: Arc<Catalog>,
  store: Arc<AnswerStore>,
  session: Arc<SessionHandle>,
  sync: Arc<SyncCoordinator>,
  sections: SectionController,
  api: Option<Arc<dyn SessionApi>>,
}

impl SurveyEngine {
  /// Assemble the engine from its parts. Returns the engine plus the
  /// event stream the shell subscribes to.
  pub fn new(
    catalog: Catalog,
    api: Option<Arc<dyn SessionApi>>,
    storage: Arc<LocalStore>,
    cfg: EngineConfig,
  ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let catalog = Arc::new(catalog);
    let store = Arc::new(AnswerStore::new());
    let session = Arc::new(SessionHandle::new());
    let tracker = Arc::new(Mutex::new(TimeTracker::restore(storage.clone())));

    let sync = SyncCoordinator::new(
      cfg,
      catalog.clone(),
      store.clone(),
      session.clone(),
      tracker.clone(),
      api.clone(),
      tx.clone(),
    );
    let sections = SectionController::new(
      session.clone(),
      store.clone(),
      tracker,
      storage,
      api.clone(),
      tx,
    );

    let engine = Self { catalog, store, session, sync, sections, api };
    (engine, rx)
  }

  /// Environment-driven assembly: catalog, local storage dir and the
  /// optional remote API all come from env variables.
  pub fn from_env() -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError> {
    let data_dir =
      std::env::var("SURVEY_DATA_DIR").unwrap_or_else(|_| "./survey-data".to_string());
    let storage = Arc::new(LocalStore::open(&data_dir)?);
    let catalog = load_catalog_from_env();
    let api = HttpSessionApi::from_env()
      .map(|c| Arc::new(c) as Arc<dyn SessionApi>);
    if api.is_none() {
      info!(target: "survei_engine", "SURVEY_API_BASE_URL not set; running local-only");
    }
    Ok(Self::new(catalog, api, storage, EngineConfig::from_env()))
  }

  /// Restore a previous visit and replay its remote answers. Call once
  /// on mount, before any interaction.
  #[instrument(level = "info", skip(self))]
  pub async fn start(&self) {
    self.sections.resume().await;

    let (Some(api), Some(session_id)) = (self.api.as_ref(), self.session.id().await) else {
      return;
    };
    match api.get_session(&session_id).await {
      Ok(data) => {
        self.store.hydrate(&self.catalog, &data.responses).await;
        for item in &data.responses {
          self.sync.prime_committed(&item.question_code, &item.valid_response).await;
        }
        info!(target: "survei_engine", responses = data.responses.len(), "Hydrated prior answers");
      }
      Err(e) => {
        warn!(target: "survei_engine", error = %e, "Could not hydrate prior session; starting from local state");
      }
    }
  }

  /// Apply one respondent edit: optimistic store write, then hand the
  /// outcome to the sync coordinator.
  pub async fn set_answer(&self, code: &str, raw: &str) -> Result<SetOutcome, EngineError> {
    let Some(q) = self.catalog.get(code) else {
      return Err(EngineError::UnknownQuestion(code.to_string()));
    };
    let outcome = self.store.set(q, raw).await;
    self.sync.handle_edit(q, &outcome, raw).await;
    Ok(outcome)
  }

  pub async fn answer(&self, code: &str) -> Option<String> {
    self.store.get(code).await
  }

  pub async fn answer_error(&self, code: &str) -> Option<String> {
    self.store.error(code).await
  }

  pub async fn completion(&self) -> CompletionStatus {
    self.store.completion_status(&self.catalog).await
  }

  /// Prompt text with `{$code}` placeholders filled from current answers.
  pub async fn question_text(&self, code: &str) -> Option<String> {
    let q = self.catalog.get(code)?;
    Some(q.render_text(&self.store.snapshot().await))
  }

  /// Questions of a section that pass their conditional-display hints.
  pub async fn visible_questions(&self, section: SectionId) -> Vec<&Question> {
    let answers = self.store.snapshot().await;
    self
      .catalog
      .section_questions(section)
      .into_iter()
      .filter(|q| self.catalog.is_visible(q, &answers))
      .collect()
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub async fn active_section(&self) -> SectionId {
    self.sections.active().await
  }

  pub async fn request_section(&self, target: SectionId) -> SwitchOutcome {
    self.sections.request_switch(target).await
  }

  pub async fn confirm_access_code(&self, code: &str) -> Result<(), EngineError> {
    self.sections.confirm_gate(code).await
  }

  pub async fn cancel_access_gate(&self) {
    self.sections.cancel_gate().await
  }

  /// Unmount hook for one question view; drops its buffered edits.
  pub async fn cancel_question(&self, code: &str) {
    self.sync.cancel(code).await;
  }

  /// Page-unload hook: final time accrual plus the non-blocking beacon.
  pub async fn unload(&self) {
    self.sections.unload().await;
  }
}
