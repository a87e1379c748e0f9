// SPDX-License-Identifier: MIT

//! Workflow state threaded through the graph
//!
//! One `WorkflowState` is exclusively owned by one in-flight invocation.
//! Checkpoint snapshots serialize it with a version tag so a snapshot
//! written by an older revision fails loudly instead of being misread.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::ClaimflowError;

/// Current checkpoint snapshot schema revision.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The fixed clarifying question written into clarify checkpoints.
pub const CLARIFY_QUESTION: &str =
    "Is your question about your plan benefits or about the status of a specific claim?";

/// The router's decision about which specialist path handles a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Benefit,
    Claim,
    Both,
    Clarify,
    #[default]
    Unknown,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Benefit => "benefit",
            Route::Claim => "claim",
            Route::Both => "both",
            Route::Clarify => "clarify",
            Route::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of evidence behind an answer segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// Source file or collection the document came from.
    pub file: String,
    pub doc_id: Option<String>,
    /// Reserved for exact-span citation; always empty for now.
    #[serde(default)]
    pub offsets: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
}

/// Which responder, model and evidence produced an answer segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvenanceEntry {
    pub agent: String,
    pub model_name: String,
    pub quantization: Option<String>,
    pub sources: Vec<SourceRef>,
}

/// The single mutable record threaded through the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub user_id: String,
    pub question: String,

    #[serde(default)]
    pub route: Route,
    /// Present only when the semantic classifier produced the route.
    #[serde(default)]
    pub route_confidence: Option<f32>,

    #[serde(default)]
    pub benefit_result: Option<String>,
    #[serde(default)]
    pub claim_result: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,

    /// Append-only within one invocation, in node-execution order.
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
    /// Most recently written checkpoint, if any.
    #[serde(default)]
    pub checkpoint_id: Option<String>,
}

impl WorkflowState {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            question: question.into(),
            route: Route::Unknown,
            route_confidence: None,
            benefit_result: None,
            claim_result: None,
            summary: None,
            provenance: Vec::new(),
            checkpoint_id: None,
        }
    }

    /// True when the engine stopped awaiting user clarification.
    pub fn is_paused(&self) -> bool {
        self.summary.is_none() && self.checkpoint_id.is_some()
    }
}

/// Versioned serialized form of a `WorkflowState` stored in checkpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    pub state: WorkflowState,
}

impl StateSnapshot {
    pub fn encode(state: &WorkflowState) -> Result<String, ClaimflowError> {
        let snapshot = StateSnapshot {
            version: SNAPSHOT_VERSION,
            state: state.clone(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    pub fn decode(raw: &str) -> Result<WorkflowState, ClaimflowError> {
        let snapshot: StateSnapshot = serde_json::from_str(raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ClaimflowError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot.state)
    }
}

/// Scalar metadata attached to an evidence candidate or document.
pub type Metadata = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_default_is_unknown() {
        assert_eq!(Route::default(), Route::Unknown);
        assert_eq!(Route::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_route_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Route::Both).unwrap(), "\"both\"");
        let route: Route = serde_json::from_str("\"clarify\"").unwrap();
        assert_eq!(route, Route::Clarify);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = WorkflowState::new("s1", "u1", "What is my deductible?");
        state.route = Route::Benefit;
        state.benefit_result = Some("answer".into());
        state.provenance.push(ProvenanceEntry {
            agent: "benefit".into(),
            model_name: "m".into(),
            quantization: None,
            sources: vec![SourceRef {
                file: "benefits.json".into(),
                doc_id: Some("benefit_01".into()),
                offsets: vec![],
                member_id: Some("M123456".into()),
            }],
        });

        let raw = StateSnapshot::encode(&state).unwrap();
        let restored = StateSnapshot::decode(&raw).unwrap();
        assert_eq!(restored.session_id, "s1");
        assert_eq!(restored.route, Route::Benefit);
        assert_eq!(restored.benefit_result.as_deref(), Some("answer"));
        assert_eq!(restored.provenance, state.provenance);
    }

    #[test]
    fn test_snapshot_version_mismatch_fails_loudly() {
        let raw = r#"{"version": 99, "state": {"session_id":"s","user_id":"u","question":"q"}}"#;
        match StateSnapshot::decode(raw) {
            Err(ClaimflowError::SnapshotVersion { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, SNAPSHOT_VERSION);
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_snapshot_decode_fills_defaults() {
        let raw = r#"{"version": 1, "state": {"session_id":"s","user_id":"u","question":"q"}}"#;
        let state = StateSnapshot::decode(raw).unwrap();
        assert_eq!(state.route, Route::Unknown);
        assert!(state.provenance.is_empty());
        assert!(state.summary.is_none());
    }

    #[test]
    fn test_paused_state() {
        let mut state = WorkflowState::new("s", "u", "q");
        assert!(!state.is_paused());
        state.checkpoint_id = Some("ck1".into());
        assert!(state.is_paused());
        state.summary = Some("done".into());
        assert!(!state.is_paused());
    }
}
