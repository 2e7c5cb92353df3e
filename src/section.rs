//! Section/tab controller: which survey phase is visible, the one-time
//! access-code gate in front of the timed sections, and the time-tracker
//! transitions every switch drives.
//!
//! The last visited section and the session-started flag are persisted
//! locally, so a reload resumes the same section without re-prompting.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::catalog::SectionId;
use crate::client::{AnswerPayload, SessionApi, SessionHandle, TimePayload};
use crate::error::EngineError;
use crate::protocol::EngineEvent;
use crate::seeds::CONSENT_QUESTION;
use crate::storage::{keys, LocalStore};
use crate::store::AnswerStore;
use crate::timing::TimeTracker;

/// Outcome of a switch request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
  /// The switch completed.
  Switched,
  /// The switch is suspended behind the access-code gate; call
  /// `confirm_gate` or `cancel_gate` to resolve it.
  GatePending,
}

pub struct SectionController {
  active: RwLock<SectionId>,
  gate_target: Mutex<Option<SectionId>>,
  session: Arc<SessionHandle>,
  store: Arc<AnswerStore>,
  tracker: Arc<Mutex<TimeTracker>>,
  storage: Arc<LocalStore>,
  api: Option<Arc<dyn SessionApi>>,
  events: mpsc::UnboundedSender<EngineEvent>,
}

impl SectionController {
  pub fn new(
    session: Arc<SessionHandle>,
    store: Arc<AnswerStore>,
    tracker: Arc<Mutex<TimeTracker>>,
    storage: Arc<LocalStore>,
    api: Option<Arc<dyn SessionApi>>,
    events: mpsc::UnboundedSender<EngineEvent>,
  ) -> Self {
    Self {
      active: RwLock::new(SectionId::Persetujuan),
      gate_target: Mutex::new(None),
      session,
      store,
      tracker,
      storage,
      api,
      events,
    }
  }

  pub async fn active(&self) -> SectionId {
    *self.active.read().await
  }

  /// Resume a previous visit: restore the session id and jump back to the
  /// last section without re-prompting for the access code.
  #[instrument(level = "info", skip(self))]
  pub async fn resume(&self) {
    let started = self.storage.get(keys::SESSION_STARTED).as_deref() == Some("true");
    if !started {
      return;
    }
    let Some(id) = self.storage.get(keys::SESSION_ID) else {
      warn!(target: "survei_engine", "Session flagged as started but no id stored; staying on consent");
      return;
    };
    self.session.set(id).await;
    let section = self
      .storage
      .get(keys::LAST_SECTION)
      .and_then(|s| SectionId::parse(&s))
      .unwrap_or(SectionId::Persetujuan);
    info!(target: "survei_engine", section = section.as_str(), "Resuming previous session");
    self.complete_switch(section).await;
  }

  /// Ask to show `target`. Entering a timed section before a session is
  /// minted suspends the switch behind the access-code gate; every other
  /// transition completes immediately.
  #[instrument(level = "info", skip(self), fields(target = target.as_str()))]
  pub async fn request_switch(&self, target: SectionId) -> SwitchOutcome {
    if target.is_timed() && !self.session.is_started().await {
      *self.gate_target.lock().await = Some(target);
      let _ = self.events.send(EngineEvent::GateRequired { target });
      return SwitchOutcome::GatePending;
    }
    self.complete_switch(target).await;
    SwitchOutcome::Switched
  }

  /// Pass the gate: validate the access code, mint the session, submit the
  /// fixed consent answer, then complete the suspended switch.
  #[instrument(level = "info", skip(self, access_code))]
  pub async fn confirm_gate(&self, access_code: &str) -> Result<(), EngineError> {
    let Some(api) = self.api.clone() else {
      // No collaborator means no session can ever be minted.
      return Err(EngineError::NoSession);
    };

    if let Err(e) = api.validate_access_code(access_code).await {
      let _ = self.events.send(EngineEvent::GateRejected { message: e.to_string() });
      self.revert_to_consent().await;
      return Err(e);
    }

    let session_id = match api.create_session().await {
      Ok(id) => id,
      Err(e) => {
        let _ = self.events.send(EngineEvent::GateRejected { message: e.to_string() });
        self.revert_to_consent().await;
        return Err(e);
      }
    };

    self.session.set(session_id.clone()).await;
    self.storage.set(keys::SESSION_ID, &session_id);
    self.storage.set(keys::SESSION_STARTED, "true");
    info!(target: "survei_engine", "Session minted");

    // Initial fixed-code answer: the consent the respondent already gave.
    // Failure here is logged, not fatal: the session exists either way.
    let consent = self
      .store
      .get(CONSENT_QUESTION)
      .await
      .unwrap_or_else(|| "Setuju".to_string());
    let payload = AnswerPayload {
      question_code: CONSENT_QUESTION.to_string(),
      valid_response: consent,
    };
    if let Err(e) = api.submit_answer(&session_id, &payload).await {
      warn!(target: "survei_engine", error = %e, "Initial consent submit failed");
    }

    let _ = self.events.send(EngineEvent::SessionStarted { session_id });

    if let Some(target) = self.gate_target.lock().await.take() {
      self.complete_switch(target).await;
    }
    Ok(())
  }

  /// Respondent backed out of the gate; drop the suspended switch and
  /// return to consent.
  #[instrument(level = "info", skip(self))]
  pub async fn cancel_gate(&self) {
    self.revert_to_consent().await;
  }

  async fn revert_to_consent(&self) {
    *self.gate_target.lock().await = None;
    self.complete_switch(SectionId::Persetujuan).await;
  }

  async fn complete_switch(&self, target: SectionId) {
    let flushed = {
      let mut tracker = self.tracker.lock().await;
      tracker.on_switch(target, Instant::now())
    };
    if let Some(time) = flushed {
      self.flush_time_remote(time).await;
    }

    *self.active.write().await = target;
    self.storage.set(keys::LAST_SECTION, target.as_str());
    let _ = self.events.send(EngineEvent::SectionChanged { section: target });
  }

  /// Best-effort remote flush of the time buckets; never blocks a switch.
  async fn flush_time_remote(&self, time: TimePayload) {
    let _ = self.events.send(EngineEvent::TimeFlushed {
      survei_ms: time.survei_ms,
      karakteristik_ms: time.karakteristik_ms,
    });
    let (Some(api), Some(session_id)) = (self.api.clone(), self.session.id().await) else {
      return;
    };
    tokio::spawn(async move {
      match api.update_time_consumed(&session_id, &time).await {
        Ok(()) | Err(EngineError::Aborted) => {}
        Err(e) => warn!(target: "timing", error = %e, "Best-effort time flush failed"),
      }
    });
  }

  /// Page-unload hook: accrue the final interval and hand the buckets to
  /// the non-blocking beacon transport. Explicitly may be lost.
  #[instrument(level = "info", skip(self))]
  pub async fn unload(&self) {
    let time = {
      let mut tracker = self.tracker.lock().await;
      tracker.on_unload(Instant::now())
    };
    let (Some(api), Some(session_id)) = (self.api.as_ref(), self.session.id().await) else {
      return;
    };
    api.send_time_beacon(&session_id, &time);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use crate::testing::RecordingApi;

  struct Rig {
    ctrl: SectionController,
    api: Arc<RecordingApi>,
    storage: Arc<LocalStore>,
    session: Arc<SessionHandle>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    _dir: tempfile::TempDir,
  }

  fn rig() -> Rig {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(LocalStore::open(dir.path()).expect("open"));
    let session = Arc::new(SessionHandle::new());
    let store = Arc::new(AnswerStore::new());
    let tracker = Arc::new(Mutex::new(TimeTracker::restore(storage.clone())));
    let api = Arc::new(RecordingApi::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let ctrl = SectionController::new(
      session.clone(),
      store,
      tracker,
      storage.clone(),
      Some(api.clone() as Arc<dyn SessionApi>),
      tx,
    );
    Rig { ctrl, api, storage, session, events: rx, _dir: dir }
  }

  fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
      out.push(ev);
    }
    out
  }

  #[tokio::test]
  async fn timed_section_is_gated_until_session_exists() {
    let mut r = rig();
    let outcome = r.ctrl.request_switch(SectionId::Karakteristik).await;
    assert_eq!(outcome, SwitchOutcome::GatePending);
    assert_eq!(r.ctrl.active().await, SectionId::Persetujuan);
    assert!(matches!(
      drain(&mut r.events).first(),
      Some(EngineEvent::GateRequired { target: SectionId::Karakteristik })
    ));
  }

  #[tokio::test]
  async fn confirming_gate_mints_session_and_completes_switch() {
    let mut r = rig();
    r.ctrl.request_switch(SectionId::Survei).await;
    r.ctrl.confirm_gate("ABC123").await.expect("gate passes");

    assert_eq!(r.ctrl.active().await, SectionId::Survei);
    assert!(r.session.is_started().await);
    assert_eq!(r.api.sessions_created(), 1);
    // The fixed consent answer was submitted on session start.
    let submitted = r.api.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, CONSENT_QUESTION);

    let events = drain(&mut r.events);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::SessionStarted { .. })));
    assert!(events
      .iter()
      .any(|e| matches!(e, EngineEvent::SectionChanged { section: SectionId::Survei })));

    assert_eq!(r.storage.get(keys::SESSION_STARTED).as_deref(), Some("true"));
    assert_eq!(r.storage.get(keys::LAST_SECTION).as_deref(), Some("survei"));
  }

  #[tokio::test]
  async fn rejected_access_code_reverts_to_consent() {
    let mut r = rig();
    r.api.reject_access_codes("Kode akses tidak valid");
    r.ctrl.request_switch(SectionId::Survei).await;
    let err = r.ctrl.confirm_gate("WRONG").await.unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));
    assert_eq!(r.ctrl.active().await, SectionId::Persetujuan);
    assert_eq!(r.api.sessions_created(), 0);
    assert!(drain(&mut r.events)
      .iter()
      .any(|e| matches!(e, EngineEvent::GateRejected { .. })));
  }

  #[tokio::test]
  async fn gate_without_remote_api_reports_missing_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(LocalStore::open(dir.path()).expect("open"));
    let (tx, _rx) = mpsc::unbounded_channel();
    let ctrl = SectionController::new(
      Arc::new(SessionHandle::new()),
      Arc::new(AnswerStore::new()),
      Arc::new(Mutex::new(TimeTracker::restore(storage.clone()))),
      storage,
      None,
      tx,
    );
    ctrl.request_switch(SectionId::Survei).await;
    let err = ctrl.confirm_gate("ABC123").await.unwrap_err();
    assert!(matches!(err, EngineError::NoSession));
    assert_eq!(ctrl.active().await, SectionId::Persetujuan);
  }

  #[tokio::test]
  async fn cancel_gate_drops_the_pending_switch() {
    let r = rig();
    r.ctrl.request_switch(SectionId::Karakteristik).await;
    r.ctrl.cancel_gate().await;
    assert_eq!(r.ctrl.active().await, SectionId::Persetujuan);

    // Gate must come back on the next attempt: nothing was minted.
    let outcome = r.ctrl.request_switch(SectionId::Karakteristik).await;
    assert_eq!(outcome, SwitchOutcome::GatePending);
  }

  #[tokio::test]
  async fn switches_between_timed_sections_bypass_gate_once_started() {
    let r = rig();
    r.ctrl.request_switch(SectionId::Survei).await;
    r.ctrl.confirm_gate("ABC123").await.expect("gate passes");
    let outcome = r.ctrl.request_switch(SectionId::Karakteristik).await;
    assert_eq!(outcome, SwitchOutcome::Switched);
    assert_eq!(r.ctrl.active().await, SectionId::Karakteristik);
  }

  #[tokio::test]
  async fn resume_restores_section_without_reprompting() {
    let r = rig();
    r.storage.set(keys::SESSION_STARTED, "true");
    r.storage.set(keys::SESSION_ID, "sess-42");
    r.storage.set(keys::LAST_SECTION, "survei");

    r.ctrl.resume().await;
    assert_eq!(r.ctrl.active().await, SectionId::Survei);
    assert_eq!(r.session.id().await.as_deref(), Some("sess-42"));

    let outcome = r.ctrl.request_switch(SectionId::Karakteristik).await;
    assert_eq!(outcome, SwitchOutcome::Switched);
  }

  #[tokio::test]
  async fn unload_sends_the_time_beacon() {
    let r = rig();
    r.ctrl.request_switch(SectionId::Survei).await;
    r.ctrl.confirm_gate("ABC123").await.expect("gate passes");
    tokio::time::sleep(Duration::from_millis(30)).await;
    r.ctrl.unload().await;

    let beacons = r.api.beacons();
    assert_eq!(beacons.len(), 1);
    assert!(beacons[0].survei_ms >= 30);
  }
}
