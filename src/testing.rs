//! Shared test double for the remote session collaborator: records every
//! call, with injectable failures and latency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{AnswerPayload, ResponseItem, SessionApi, SessionData, TimePayload};
use crate::error::EngineError;

#[derive(Default)]
pub struct RecordingApi {
  submitted: Mutex<Vec<(String, String)>>,
  time_updates: Mutex<Vec<TimePayload>>,
  beacons: Mutex<Vec<TimePayload>>,
  sessions_created: AtomicUsize,
  fail_submits: AtomicUsize,
  reject_access_code: Mutex<Option<String>>,
  submit_delay: Mutex<Option<Duration>>,
  session_data: Mutex<Option<SessionData>>,
}

impl RecordingApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn submitted(&self) -> Vec<(String, String)> {
    self.submitted.lock().expect("lock").clone()
  }

  pub fn time_updates(&self) -> Vec<TimePayload> {
    self.time_updates.lock().expect("lock").clone()
  }

  pub fn beacons(&self) -> Vec<TimePayload> {
    self.beacons.lock().expect("lock").clone()
  }

  pub fn sessions_created(&self) -> usize {
    self.sessions_created.load(Ordering::SeqCst)
  }

  /// Fail the next `n` submit_answer calls with a save error.
  pub fn fail_next_submits(&self, n: usize) {
    self.fail_submits.store(n, Ordering::SeqCst);
  }

  /// Make validate_access_code reject with `message`.
  pub fn reject_access_codes(&self, message: &str) {
    *self.reject_access_code.lock().expect("lock") = Some(message.to_string());
  }

  /// Delay every submit_answer ack, for in-flight ordering tests.
  pub fn set_submit_delay(&self, delay: Duration) {
    *self.submit_delay.lock().expect("lock") = Some(delay);
  }

  /// Preload the state returned by get_session.
  pub fn set_session_data(&self, status: &str, responses: Vec<(&str, &str)>) {
    let responses = responses
      .into_iter()
      .map(|(code, value)| ResponseItem {
        question_code: code.to_string(),
        valid_response: value.to_string(),
      })
      .collect();
    *self.session_data.lock().expect("lock") =
      Some(SessionData { status: status.to_string(), responses });
  }
}

#[async_trait]
impl SessionApi for RecordingApi {
  async fn submit_answer(
    &self,
    _session_id: &str,
    payload: &AnswerPayload,
  ) -> Result<(), EngineError> {
    let delay = *self.submit_delay.lock().expect("lock");
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    let remaining = self.fail_submits.load(Ordering::SeqCst);
    if remaining > 0 {
      self.fail_submits.store(remaining - 1, Ordering::SeqCst);
      return Err(EngineError::Save("HTTP 500: injected".into()));
    }
    self
      .submitted
      .lock()
      .expect("lock")
      .push((payload.question_code.clone(), payload.valid_response.clone()));
    Ok(())
  }

  async fn update_time_consumed(
    &self,
    _session_id: &str,
    time: &TimePayload,
  ) -> Result<(), EngineError> {
    self.time_updates.lock().expect("lock").push(*time);
    Ok(())
  }

  fn send_time_beacon(&self, _session_id: &str, time: &TimePayload) {
    self.beacons.lock().expect("lock").push(*time);
  }

  async fn get_session(&self, _session_id: &str) -> Result<SessionData, EngineError> {
    self
      .session_data
      .lock()
      .expect("lock")
      .clone()
      .ok_or_else(|| EngineError::Save("Sesi tidak ditemukan".into()))
  }

  async fn validate_access_code(&self, _code: &str) -> Result<(), EngineError> {
    if let Some(message) = self.reject_access_code.lock().expect("lock").clone() {
      return Err(EngineError::AccessDenied(message));
    }
    Ok(())
  }

  async fn create_session(&self) -> Result<String, EngineError> {
    self.sessions_created.fetch_add(1, Ordering::SeqCst);
    Ok(uuid::Uuid::new_v4().to_string())
  }
}
