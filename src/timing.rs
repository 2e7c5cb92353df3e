//! Per-section time tracking.
//!
//! Attributes wall-clock duration to exactly one timed section at any
//! instant. Local state is the source of truth: every accrual is mirrored
//! synchronously to durable local storage, while remote flushes are
//! best-effort and eventually consistent. `last_switch` advances to `now`
//! immediately after each computed delta, so an interval is never credited
//! twice no matter how often flushes run.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::catalog::SectionId;
use crate::client::TimePayload;
use crate::storage::{keys, LocalStore};

pub struct TimeTracker {
  /// The timed section currently accruing, if any.
  active: Option<SectionId>,
  last_switch: Option<Instant>,
  consumed: TimePayload,
  store: Arc<LocalStore>,
}

impl TimeTracker {
  /// Restore cumulative buckets from local storage; a missing or corrupt
  /// entry starts from zero.
  pub fn restore(store: Arc<LocalStore>) -> Self {
    let consumed = store
      .get(keys::TIME_CONSUMED)
      .and_then(|raw| match serde_json::from_str(&raw) {
        Ok(t) => Some(t),
        Err(e) => {
          warn!(target: "timing", error = %e, "Corrupt time buckets in local storage; resetting");
          None
        }
      })
      .unwrap_or_default();
    Self { active: None, last_switch: None, consumed, store }
  }

  pub fn consumed(&self) -> TimePayload {
    self.consumed
  }

  pub fn active(&self) -> Option<SectionId> {
    self.active
  }

  /// Credit elapsed time to the active bucket and advance the switch
  /// instant. Returns true when a timed section was active.
  fn accrue_at(&mut self, now: Instant) -> bool {
    let (Some(section), Some(since)) = (self.active, self.last_switch) else {
      return false;
    };
    let elapsed_ms = now.saturating_duration_since(since).as_millis() as u64;
    match section {
      SectionId::Survei => self.consumed.survei_ms += elapsed_ms,
      SectionId::Karakteristik => self.consumed.karakteristik_ms += elapsed_ms,
      SectionId::Persetujuan => return false,
    }
    self.last_switch = Some(now);
    debug!(target: "timing", section = section.as_str(), elapsed_ms, survei_ms = self.consumed.survei_ms, karakteristik_ms = self.consumed.karakteristik_ms, "Accrued section time");
    self.persist_local();
    true
  }

  /// Section transition. Credits the outgoing timed section, then arms the
  /// clock for the incoming one (entering a timed section for the first
  /// time credits nothing). Returns the updated buckets when time was
  /// accrued, for a best-effort remote flush by the caller.
  pub fn on_switch(&mut self, next: SectionId, now: Instant) -> Option<TimePayload> {
    let accrued = self.accrue_at(now);
    self.active = next.is_timed().then_some(next);
    self.last_switch = self.active.map(|_| now);
    accrued.then_some(self.consumed)
  }

  /// Accrual triggered by a successful answer commit inside a timed
  /// section; captures time even without a section switch.
  pub fn on_commit(&mut self, now: Instant) -> Option<TimePayload> {
    self.accrue_at(now).then_some(self.consumed)
  }

  /// Page-unload accrual: always returns the final buckets for the
  /// non-blocking beacon, whether or not anything new was credited.
  pub fn on_unload(&mut self, now: Instant) -> TimePayload {
    self.accrue_at(now);
    self.consumed
  }

  fn persist_local(&self) {
    match serde_json::to_string(&self.consumed) {
      Ok(raw) => self.store.set(keys::TIME_CONSUMED, &raw),
      Err(e) => warn!(target: "timing", error = %e, "Unable to serialize time buckets"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn tracker() -> (TimeTracker, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(LocalStore::open(dir.path()).expect("open"));
    (TimeTracker::restore(store), dir)
  }

  #[test]
  fn switch_credits_exactly_the_elapsed_interval() {
    let (mut t, _dir) = tracker();
    let t0 = Instant::now();
    assert_eq!(t.on_switch(SectionId::Survei, t0), None); // first entry, nothing credited

    let t1 = t0 + Duration::from_millis(12_340);
    let flushed = t.on_switch(SectionId::Karakteristik, t1).expect("flush");
    assert_eq!(flushed.survei_ms, 12_340);
    assert_eq!(flushed.karakteristik_ms, 0);
  }

  #[test]
  fn interleaved_commits_and_switches_never_double_count() {
    let (mut t, _dir) = tracker();
    let t0 = Instant::now();
    t.on_switch(SectionId::Survei, t0);
    t.on_commit(t0 + Duration::from_millis(1_000));
    t.on_commit(t0 + Duration::from_millis(2_500));
    t.on_switch(SectionId::Karakteristik, t0 + Duration::from_millis(4_000));
    t.on_commit(t0 + Duration::from_millis(6_000));
    t.on_switch(SectionId::Persetujuan, t0 + Duration::from_millis(7_000));

    let total = t.consumed();
    assert_eq!(total.survei_ms, 4_000);
    assert_eq!(total.karakteristik_ms, 3_000);
  }

  #[test]
  fn repeated_flush_with_no_elapsed_time_adds_nothing() {
    let (mut t, _dir) = tracker();
    let t0 = Instant::now();
    t.on_switch(SectionId::Karakteristik, t0);
    let t1 = t0 + Duration::from_millis(500);
    t.on_commit(t1);
    t.on_commit(t1);
    t.on_unload(t1);
    assert_eq!(t.consumed().karakteristik_ms, 500);
  }

  #[test]
  fn consent_section_accrues_nothing() {
    let (mut t, _dir) = tracker();
    let t0 = Instant::now();
    t.on_switch(SectionId::Persetujuan, t0);
    assert_eq!(t.on_commit(t0 + Duration::from_millis(900)), None);
    assert_eq!(t.consumed(), TimePayload::default());
  }

  #[test]
  fn buckets_survive_restore() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(LocalStore::open(dir.path()).expect("open"));
    {
      let mut t = TimeTracker::restore(store.clone());
      let t0 = Instant::now();
      t.on_switch(SectionId::Survei, t0);
      t.on_switch(SectionId::Persetujuan, t0 + Duration::from_millis(750));
    }
    let restored = TimeTracker::restore(store);
    assert_eq!(restored.consumed().survei_ms, 750);
  }
}
