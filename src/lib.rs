//! Survei · answer state and synchronization engine
//!
//! Client-side core of a multi-section transport survey: consent
//! ("persetujuan"), respondent characteristics ("karakteristik") and
//! trip details ("survei"). The crate owns the in-memory answer/error
//! maps, debounces and orders remote commits, tracks per-section time,
//! and gates entry into the timed sections behind an access code.
//! Rendering, routing and the server are external collaborators.
//!
//! Important env variables:
//!   SURVEY_API_BASE_URL : enables the remote session API if present
//!   SURVEY_API_TOKEN    : bearer token for the session API (optional)
//!   SURVEY_CATALOG_PATH : path to a TOML question bank (else built-in seeds)
//!   SURVEY_DATA_DIR     : directory for the durable local state file
//!   SYNC_DEBOUNCE_MS    : debounce window for text/number commits (default 4000)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

pub mod telemetry;
pub mod util;
pub mod error;
pub mod catalog;
pub mod seeds;
pub mod config;
pub mod validate;
pub mod store;
pub mod client;
pub mod storage;
pub mod timing;
pub mod protocol;
pub mod sync;
pub mod section;
pub mod engine;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{Catalog, Question, SectionId};
pub use client::{HttpSessionApi, SessionApi};
pub use config::EngineConfig;
pub use engine::SurveyEngine;
pub use error::EngineError;
pub use protocol::EngineEvent;
pub use section::SwitchOutcome;
pub use storage::LocalStore;
pub use store::{CompletionStatus, SetOutcome};
