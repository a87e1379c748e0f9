// SPDX-License-Identifier: MIT

//! Specialist responders
//!
//! Each specialist turns a question plus retrieved evidence into a
//! domain-scoped answer via the generative model, records provenance in the
//! ledger, and returns the provenance entries for the workflow state. The
//! summary responder merges the specialists' answers.

mod benefit;
mod claim;
mod summary;

pub use benefit::BenefitResponder;
pub use claim::ClaimResponder;
pub use summary::SummaryResponder;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;

use super::events::SessionEvent;
use super::retrieval::Candidate;
use super::state::{ProvenanceEntry, SourceRef};

/// Model label recorded when a question is answered from structured fields
/// without a generative call.
pub(crate) const DIRECT_LOOKUP: &str = "direct-lookup";

/// A responder's answer plus the provenance behind it.
#[derive(Debug, Clone)]
pub struct ResponderOutput {
    pub answer: String,
    pub provenance: Vec<ProvenanceEntry>,
}

static OBJECT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:benefit|claim)_[0-9a-f]{2,32}\b").expect("object id pattern"));

/// Find an exact domain-object identifier with the given prefix in the
/// question, enabling the structured-fields quick path.
pub(crate) fn exact_object_id(question: &str, prefix: &str) -> Option<String> {
    OBJECT_ID
        .find_iter(question)
        .map(|m| m.as_str().to_string())
        .find(|id| id.starts_with(prefix))
}

/// Bridge model text increments onto the session event channel.
///
/// The caller must await the returned handle after the generative call so
/// every token event is delivered before the terminal meta event.
pub(crate) fn spawn_token_forwarder(
    events: mpsc::Sender<SessionEvent>,
) -> (mpsc::Sender<String>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(32);
    let handle = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if events.send(SessionEvent::Token(chunk)).await.is_err() {
                break;
            }
        }
    });
    (tx, handle)
}

/// Run a generative call with live token forwarding, waiting for the
/// forwarder to drain before returning.
pub(crate) async fn generate_streaming(
    model: &dyn crate::llm::GenerativeModel,
    prompt: &str,
    events: Option<&mpsc::Sender<SessionEvent>>,
) -> Result<String, crate::llm::ModelError> {
    let (chunks, forwarder) = match events {
        Some(tx) => {
            let (chunks, handle) = spawn_token_forwarder(tx.clone());
            (Some(chunks), Some(handle))
        }
        None => (None, None),
    };

    let result = model.stream(prompt, chunks).await;
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }
    result
}

pub(crate) fn source_from(candidate: &Candidate, collection: &str) -> SourceRef {
    SourceRef {
        file: candidate
            .metadata
            .get("source")
            .cloned()
            .unwrap_or_else(|| collection.to_string()),
        doc_id: Some(candidate.id.clone()),
        offsets: Vec::new(),
        member_id: candidate.metadata.get("member_id").cloned(),
    }
}

/// Deterministic rendering of a document's scalar fields, sorted by key.
pub(crate) fn structured_answer(candidate: &Candidate) -> String {
    let mut fields: Vec<(&String, &String)> = candidate
        .metadata
        .iter()
        .filter(|(key, _)| key.as_str() != "source")
        .collect();
    fields.sort();

    let mut out = format!("Record {}:\n", candidate.id);
    for (key, value) in fields {
        out.push_str(&format!("- {}: {}\n", key, value));
    }
    out
}
