//! Outbound engine events consumed by the presentation shell (serde ready).
//! Keep this small and stable so the shell and engine can evolve
//! independently.

use serde::Serialize;

use crate::catalog::SectionId;

/// Everything the shell can observe about the engine, delivered over an
/// unbounded channel. Save failures surface here, deliberately separate
/// from per-question format errors (those live in the answer store).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The access-code gate must be passed before entering `target`.
    GateRequired { target: SectionId },
    /// The collaborator refused the access code; the gate stays up.
    GateRejected { message: String },
    /// A session was minted; remote persistence is active from here on.
    SessionStarted { session_id: String },
    SectionChanged { section: SectionId },
    /// One answer reached the remote session.
    AnswerCommitted { code: String },
    /// A remote commit genuinely failed (not an abort); the next edit is
    /// the retry path.
    SaveFailed { code: String, message: String },
    /// Cumulative time buckets were handed to the remote collaborator.
    TimeFlushed { survei_ms: u64, karakteristik_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::EngineEvent;
    use crate::catalog::SectionId;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let json = serde_json::to_string(&EngineEvent::GateRequired {
            target: SectionId::Survei,
        })
        .expect("serialize");
        assert_eq!(json, r#"{"type":"gate_required","target":"survei"}"#);

        let json = serde_json::to_string(&EngineEvent::SaveFailed {
            code: "S001".into(),
            message: "HTTP 500".into(),
        })
        .expect("serialize");
        assert!(json.contains(r#""type":"save_failed""#));
    }
}
