//! Durable local key-value storage.
//!
//! A single JSON file under the data dir holds the handful of fixed keys the
//! engine needs across reloads: last active section, session-started flag,
//! session id, and the cumulative time buckets. Reads come from an in-memory
//! cache; every write is flushed synchronously so an abrupt exit loses at
//! most the write in progress.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::EngineError;

/// Fixed keys. Namespaced by the file itself; keep these stable across
/// releases or resumed sessions break.
pub mod keys {
  pub const LAST_SECTION: &str = "last_section";
  pub const SESSION_STARTED: &str = "session_started";
  pub const SESSION_ID: &str = "session_id";
  pub const TIME_CONSUMED: &str = "time_consumed";
}

const STATE_FILE: &str = "state.json";

pub struct LocalStore {
  path: PathBuf,
  cache: Mutex<HashMap<String, String>>,
}

impl LocalStore {
  /// Open (or create) the state file under `dir`. An unreadable or corrupt
  /// file starts fresh rather than blocking the survey.
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, EngineError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| EngineError::Storage(e.to_string()))?;
    let path = dir.join(STATE_FILE);

    let cache = match fs::read_to_string(&path) {
      Ok(raw) if !raw.trim().is_empty() => match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(e) => {
          warn!(target: "survei_engine", path = %path.display(), error = %e, "Corrupt local state file; starting fresh");
          HashMap::new()
        }
      },
      _ => HashMap::new(),
    };

    Ok(Self { path, cache: Mutex::new(cache) })
  }

  pub fn get(&self, key: &str) -> Option<String> {
    self.cache.lock().ok()?.get(key).cloned()
  }

  pub fn set(&self, key: &str, value: &str) {
    if let Ok(mut cache) = self.cache.lock() {
      cache.insert(key.to_string(), value.to_string());
      self.persist(&cache);
    }
  }

  pub fn remove(&self, key: &str) {
    if let Ok(mut cache) = self.cache.lock() {
      if cache.remove(key).is_some() {
        self.persist(&cache);
      }
    }
  }

  /// Best-effort synchronous flush; a failed write keeps the in-memory
  /// value so the running session is unaffected.
  fn persist(&self, cache: &HashMap<String, String>) {
    match serde_json::to_string_pretty(cache) {
      Ok(payload) => {
        if let Err(e) = fs::write(&self.path, payload) {
          warn!(target: "survei_engine", path = %self.path.display(), error = %e, "Unable to write local state");
        }
      }
      Err(e) => {
        warn!(target: "survei_engine", error = %e, "Unable to serialize local state");
      }
    }
  }
}
