//! Remote session collaborator: trait contract plus the reqwest-backed
//! implementation.
//!
//! The engine only needs "submit answer -> ack | error" and "persist time
//! buckets -> ack | error" shaped calls; everything else about the backend
//! is out of scope. Calls are instrumented and log latencies and sizes,
//! not respondent answers.
//!
//! NOTE: We never log the bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::util::trunc_for_log;

/// One answer commit, as the wire expects it.
#[derive(Clone, Debug, Serialize)]
pub struct AnswerPayload {
  pub question_code: String,
  pub valid_response: String,
}

/// Cumulative per-section time buckets, milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePayload {
  pub survei_ms: u64,
  pub karakteristik_ms: u64,
}

/// A previously persisted answer, replayed on mount.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseItem {
  pub question_code: String,
  pub valid_response: String,
}

/// Remote view of one respondent's participation.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionData {
  pub status: String,
  #[serde(default)]
  pub responses: Vec<ResponseItem>,
}

/// Contract the engine consumes. The engine degrades gracefully when no
/// implementation is configured: answers stay local-only.
#[async_trait]
pub trait SessionApi: Send + Sync {
  /// Remote commit of one answer.
  async fn submit_answer(&self, session_id: &str, payload: &AnswerPayload)
    -> Result<(), EngineError>;

  /// Remote persistence of cumulative time buckets.
  async fn update_time_consumed(&self, session_id: &str, time: &TimePayload)
    -> Result<(), EngineError>;

  /// Non-blocking "send and don't wait" time flush for the unload path.
  /// Explicitly best-effort: the payload may be lost.
  fn send_time_beacon(&self, session_id: &str, time: &TimePayload);

  /// Fetch prior session state, used once on mount to hydrate the store.
  async fn get_session(&self, session_id: &str) -> Result<SessionData, EngineError>;

  /// Gate check before a session may be minted.
  async fn validate_access_code(&self, code: &str) -> Result<(), EngineError>;

  /// Mint a new session; returns its opaque identifier.
  async fn create_session(&self) -> Result<String, EngineError>;
}

// --- Wire envelope ---

#[derive(Deserialize)]
struct Envelope<T> {
  success: bool,
  #[serde(default)]
  message: Option<String>,
  // No `default` attribute here: it would demand T: Default from the
  // derive, and a missing field already deserializes to None.
  data: Option<T>,
}

#[derive(Deserialize)]
struct SessionOut {
  id: String,
}

#[derive(Serialize)]
struct AccessCodeIn<'a> {
  code: &'a str,
}

/// reqwest-backed `SessionApi`.
#[derive(Clone)]
pub struct HttpSessionApi {
  client: reqwest::Client,
  base_url: String,
  token: Option<String>,
}

impl HttpSessionApi {
  /// Construct the client if SURVEY_API_BASE_URL is set; otherwise None.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("SURVEY_API_BASE_URL").ok()?;
    let token = std::env::var("SURVEY_API_TOKEN").ok();

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, base_url: base_url.trim_end_matches('/').to_string(), token })
  }

  fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
    let url = format!("{}{}", self.base_url, path);
    let mut req = self
      .client
      .request(method, url)
      .header(USER_AGENT, "survei-engine/0.1")
      .header(CONTENT_TYPE, "application/json");
    if let Some(token) = &self.token {
      req = req.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    req
  }

  async fn send<T: DeserializeOwned>(
    &self,
    req: reqwest::RequestBuilder,
  ) -> Result<Envelope<T>, EngineError> {
    let start = std::time::Instant::now();
    let res = req.send().await.map_err(|e| {
      if e.is_timeout() {
        EngineError::Http(format!("timeout: {e}"))
      } else {
        EngineError::Http(e.to_string())
      }
    })?;
    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(EngineError::Save(format!("HTTP {}: {}", status, msg)));
    }
    let envelope: Envelope<T> = res.json().await.map_err(|e| EngineError::Http(e.to_string()))?;
    debug!(target: "survei_engine", elapsed = ?start.elapsed(), "Session API call resolved");
    Ok(envelope)
  }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
  #[instrument(level = "info", skip(self, payload), fields(code = %payload.question_code))]
  async fn submit_answer(
    &self,
    session_id: &str,
    payload: &AnswerPayload,
  ) -> Result<(), EngineError> {
    let path = format!("/sessions/{}/responses", session_id);
    let env: Envelope<serde_json::Value> =
      self.send(self.request(reqwest::Method::POST, &path).json(payload)).await?;
    if !env.success {
      return Err(EngineError::Save(env.message.unwrap_or_else(|| "rejected".into())));
    }
    Ok(())
  }

  #[instrument(level = "info", skip(self, time))]
  async fn update_time_consumed(
    &self,
    session_id: &str,
    time: &TimePayload,
  ) -> Result<(), EngineError> {
    let path = format!("/sessions/{}/time", session_id);
    let env: Envelope<TimePayload> =
      self.send(self.request(reqwest::Method::PUT, &path).json(time)).await?;
    if !env.success {
      return Err(EngineError::Save(env.message.unwrap_or_else(|| "rejected".into())));
    }
    Ok(())
  }

  fn send_time_beacon(&self, session_id: &str, time: &TimePayload) {
    // Fire-and-forget: short per-request timeout, errors logged and dropped.
    // The unload path must not wait for a round trip.
    let path = format!("/sessions/{}/time", session_id);
    let req = self
      .request(reqwest::Method::PUT, &path)
      .timeout(Duration::from_secs(3))
      .json(time);
    tokio::spawn(async move {
      if let Err(e) = req.send().await {
        warn!(target: "timing", error = %e, "Time beacon lost");
      }
    });
  }

  #[instrument(level = "info", skip(self))]
  async fn get_session(&self, session_id: &str) -> Result<SessionData, EngineError> {
    let path = format!("/sessions/{}", session_id);
    let env: Envelope<SessionData> = self.send(self.request(reqwest::Method::GET, &path)).await?;
    match env.data {
      Some(data) if env.success => {
        info!(target: "survei_engine", status = %data.status, responses = data.responses.len(), "Session fetched");
        Ok(data)
      }
      _ => Err(EngineError::Save(env.message.unwrap_or_else(|| "missing session data".into()))),
    }
  }

  #[instrument(level = "info", skip_all)]
  async fn validate_access_code(&self, code: &str) -> Result<(), EngineError> {
    let env: Envelope<serde_json::Value> = self
      .send(self.request(reqwest::Method::POST, "/access-codes/validate").json(&AccessCodeIn { code }))
      .await
      .map_err(|e| match e {
        EngineError::Save(msg) => EngineError::AccessDenied(msg),
        other => other,
      })?;
    if !env.success {
      return Err(EngineError::AccessDenied(
        env.message.unwrap_or_else(|| "Kode akses tidak valid".into()),
      ));
    }
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  async fn create_session(&self) -> Result<String, EngineError> {
    let env: Envelope<SessionOut> =
      self.send(self.request(reqwest::Method::POST, "/sessions")).await?;
    match env.data {
      Some(out) if env.success => Ok(out.id),
      _ => Err(EngineError::Save(env.message.unwrap_or_else(|| "session not created".into()))),
    }
  }
}

/// Shared handle to the current session identity. Answers are only
/// persisted remotely once an id is set; until then edits stay local.
#[derive(Default)]
pub struct SessionHandle {
  id: tokio::sync::RwLock<Option<String>>,
}

impl SessionHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn id(&self) -> Option<String> {
    self.id.read().await.clone()
  }

  pub async fn is_started(&self) -> bool {
    self.id.read().await.is_some()
  }

  pub async fn set(&self, id: String) {
    *self.id.write().await = Some(id);
  }
}

/// Try to extract a clean error message from an API error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.message)
}
