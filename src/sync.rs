//! Sync coordinator: turns bursts of local edits into a minimal, ordered
//! sequence of remote writes.
//!
//! Per question code the lifecycle is Idle -> Editing (debounce timer
//! running) -> Committing -> Idle. Edits arriving during Editing reset the
//! timer (last-write-wins within the window); selection answers and the
//! "Tidak tahu" sentinel skip the window entirely. For a given code at most
//! one remote write is in flight; a value arriving mid-commit is parked in
//! `queued` and submitted when the current commit resolves, so acks can
//! never be reordered.
//!
//! Failure policy: a genuine remote failure rolls the optimistic value back
//! to the last committed one and surfaces a SaveFailed event, unless a newer
//! edit is already queued for that code (its optimistic value stands and
//! commits next); validation short-circuits never reach the network and
//! never roll back; aborts are swallowed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::catalog::{Catalog, Question};
use crate::client::{AnswerPayload, SessionApi, SessionHandle};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::protocol::EngineEvent;
use crate::store::{AnswerStore, SetOutcome};
use crate::timing::TimeTracker;
use crate::validate::DONT_KNOW;

#[derive(Default)]
struct CodeState {
  /// Bumped on every schedule/cancel; stale debounce timers compare it.
  epoch: u64,
  timer: Option<JoinHandle<()>>,
  /// Value waiting for its debounce window to expire.
  pending: Option<String>,
  in_flight: bool,
  /// Last value that arrived while a commit was in flight.
  queued: Option<String>,
  /// Last value the remote acknowledged, the rollback target.
  committed: Option<String>,
}

pub struct SyncCoordinator {
  cfg: EngineConfig,
  catalog: Arc<Catalog>,
  store: Arc<AnswerStore>,
  session: Arc<SessionHandle>,
  tracker: Arc<Mutex<TimeTracker>>,
  api: Option<Arc<dyn SessionApi>>,
  events: mpsc::UnboundedSender<EngineEvent>,
  states: Mutex<HashMap<String, CodeState>>,
}

impl SyncCoordinator {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    cfg: EngineConfig,
    catalog: Arc<Catalog>,
    store: Arc<AnswerStore>,
    session: Arc<SessionHandle>,
    tracker: Arc<Mutex<TimeTracker>>,
    api: Option<Arc<dyn SessionApi>>,
    events: mpsc::UnboundedSender<EngineEvent>,
  ) -> Arc<Self> {
    Arc::new(Self {
      cfg,
      catalog,
      store,
      session,
      tracker,
      api,
      events,
      states: Mutex::new(HashMap::new()),
    })
  }

  /// Record a value as already acknowledged by the remote (hydration).
  pub async fn prime_committed(&self, code: &str, value: &str) {
    let mut states = self.states.lock().await;
    states.entry(code.to_string()).or_default().committed = Some(value.to_string());
  }

  /// React to one store edit. The store has already applied the value
  /// optimistically and mirrored validation; this decides whether and when
  /// the edit goes remote.
  #[instrument(level = "debug", skip(self, q, outcome, raw), fields(code = %q.code))]
  pub async fn handle_edit(self: &Arc<Self>, q: &Question, outcome: &SetOutcome, raw: &str) {
    if !outcome.changed {
      return; // idempotent repeat, nothing downstream
    }

    let mut states = self.states.lock().await;
    let st = states.entry(q.code.clone()).or_default();
    st.epoch += 1;
    if let Some(timer) = st.timer.take() {
      timer.abort();
    }
    st.pending = None;

    if outcome.error.is_some() || outcome.cleared {
      // Format-invalid or cleared values never reach the network. Any
      // queued follow-up is dropped too: it describes a superseded value.
      st.queued = None;
      debug!(target: "sync", code = %q.code, cleared = outcome.cleared, "Edit held locally");
      return;
    }

    let immediate = q.commits_immediately() || raw.trim() == DONT_KNOW;
    if immediate {
      let code = q.code.clone();
      let value = raw.to_string();
      if st.in_flight {
        st.queued = Some(value); // last-write-wins behind the in-flight commit
        return;
      }
      st.in_flight = true;
      drop(states);
      let me = Arc::clone(self);
      tokio::spawn(async move { me.commit_chain(code, value).await });
      return;
    }

    // Debounced path: arm (or re-arm) the window for this code.
    st.pending = Some(raw.to_string());
    let epoch = st.epoch;
    let code = q.code.clone();
    let me = Arc::clone(self);
    st.timer = Some(tokio::spawn(async move {
      tokio::time::sleep(me.cfg.debounce).await;
      me.fire_debounced(&code, epoch).await;
    }));
  }

  /// Debounce window expired; commit the settled value unless a newer edit
  /// superseded this timer.
  async fn fire_debounced(self: &Arc<Self>, code: &str, epoch: u64) {
    let value = {
      let mut states = self.states.lock().await;
      let Some(st) = states.get_mut(code) else { return };
      if st.epoch != epoch {
        return; // superseded
      }
      st.timer = None;
      let Some(value) = st.pending.take() else { return };
      if st.in_flight {
        st.queued = Some(value);
        return;
      }
      st.in_flight = true;
      value
    };
    let me = Arc::clone(self);
    let code = code.to_string();
    tokio::spawn(async move { me.commit_chain(code, value).await });
  }

  /// Run commits for one code until no queued value remains. Only ever one
  /// chain per code (guarded by `in_flight`).
  async fn commit_chain(self: Arc<Self>, code: String, first: String) {
    let mut value = first;
    loop {
      let committed = {
        let states = self.states.lock().await;
        states.get(&code).and_then(|st| st.committed.clone())
      };

      match self.commit_one(&code, &value, committed).await {
        CommitResult::Acked => {
          let mut states = self.states.lock().await;
          if let Some(st) = states.get_mut(&code) {
            st.committed = Some(value.clone());
          }
        }
        CommitResult::Skipped | CommitResult::Failed => {}
      }

      let mut states = self.states.lock().await;
      let Some(st) = states.get_mut(&code) else { return };
      match st.queued.take() {
        Some(next) => value = next,
        None => {
          st.in_flight = false;
          return;
        }
      }
    }
  }

  async fn commit_one(&self, code: &str, value: &str, committed: Option<String>) -> CommitResult {
    let Some(api) = &self.api else {
      debug!(target: "sync", code, "No remote API configured; answer stays local");
      return CommitResult::Skipped;
    };
    let Some(session_id) = self.session.id().await else {
      debug!(target: "sync", code, "No session yet; answer stays local");
      return CommitResult::Skipped;
    };

    let payload = AnswerPayload { question_code: code.to_string(), valid_response: value.to_string() };
    match api.submit_answer(&session_id, &payload).await {
      Ok(()) => {
        debug!(target: "sync", code, "Answer committed");
        let _ = self.events.send(EngineEvent::AnswerCommitted { code: code.to_string() });
        self.accrue_commit_time(api, &session_id).await;
        CommitResult::Acked
      }
      Err(e) if !e.is_genuine_failure() => {
        // Expected teardown noise; neither a rollback nor a user-visible error.
        debug!(target: "sync", code, "Commit aborted");
        CommitResult::Skipped
      }
      Err(e) => {
        warn!(target: "sync", code, error = %e, "Commit failed");
        // Only roll back when the failed value is still the latest one.
        // A queued edit supersedes it: the store already holds that newer
        // value optimistically and the chain commits it next.
        let superseded = {
          let states = self.states.lock().await;
          states.get(code).map(|st| st.queued.is_some()).unwrap_or(false)
        };
        if superseded {
          debug!(target: "sync", code, "Newer edit queued; keeping its optimistic value");
        } else if let Some(q) = self.catalog.get(code) {
          self.store.rollback(q, committed).await;
        }
        let _ = self.events.send(EngineEvent::SaveFailed {
          code: code.to_string(),
          message: e.to_string(),
        });
        CommitResult::Failed
      }
    }
  }

  /// Every successful commit inside a timed section also flushes time, so
  /// durations are captured even without a section switch.
  async fn accrue_commit_time(&self, api: &Arc<dyn SessionApi>, session_id: &str) {
    let flushed = {
      let mut tracker = self.tracker.lock().await;
      tracker.on_commit(Instant::now())
    };
    let Some(time) = flushed else { return };
    let _ = self.events.send(EngineEvent::TimeFlushed {
      survei_ms: time.survei_ms,
      karakteristik_ms: time.karakteristik_ms,
    });
    let api = Arc::clone(api);
    let session_id = session_id.to_string();
    tokio::spawn(async move {
      match api.update_time_consumed(&session_id, &time).await {
        Ok(()) | Err(EngineError::Aborted) => {}
        Err(e) => warn!(target: "timing", error = %e, "Best-effort time flush failed"),
      }
    });
  }

  /// Unmount hook: drop the pending debounce timer and buffered values for
  /// a code so nothing writes after the owning view is gone.
  #[instrument(level = "debug", skip(self))]
  pub async fn cancel(&self, code: &str) {
    let mut states = self.states.lock().await;
    if let Some(st) = states.get_mut(code) {
      st.epoch += 1;
      if let Some(timer) = st.timer.take() {
        timer.abort();
      }
      st.pending = None;
      st.queued = None;
    }
  }

  /// Test/diagnostic visibility: is a debounce window currently armed?
  pub async fn has_pending(&self, code: &str) -> bool {
    let states = self.states.lock().await;
    states.get(code).map(|st| st.pending.is_some()).unwrap_or(false)
  }
}

enum CommitResult {
  Acked,
  Skipped,
  Failed,
}
