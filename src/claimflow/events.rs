// SPDX-License-Identifier: MIT

//! Stream events emitted to the transport layer
//!
//! Per streamed response the order is: zero or more `token` events, exactly
//! one `meta`, exactly one `done` - or exactly one `error`, exclusive with
//! meta/done.

use serde::{Deserialize, Serialize};

use super::state::ProvenanceEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPayload {
    /// "summary" for terminal answers, "orchestrator" when paused on clarify.
    pub agent: String,
    /// Final summary text, or the clarifying question when paused.
    pub text: String,
    pub provenance: Vec<ProvenanceEntry>,
    pub checkpoint_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SessionEvent {
    /// Incremental answer text.
    Token(String),
    /// Terminal metadata for a successful invocation.
    Meta(MetaPayload),
    Done,
    Error(String),
}
