// SPDX-License-Identifier: MIT

//! Typed error handling for claimflow-rs
//!
//! Retry decisions are driven by data: the responder variant carries its own
//! retry-eligibility flag, and the workflow engine consults `is_retryable`
//! instead of matching on error classes.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for claimflow-rs
#[derive(Debug, Error)]
pub enum ClaimflowError {
    /// Route classification failed (normally absorbed by the lexical fallback).
    #[error("routing failed: {0}")]
    Routing(String),

    /// Vector-index or reranker failure inside the retrieval pipeline.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A specialist or summary responder call failed.
    #[error("{agent} responder failed: {message}")]
    Responder {
        agent: &'static str,
        message: String,
        retryable: bool,
    },

    /// Resume referenced a missing or already-consumed checkpoint.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// A checkpoint snapshot was written by an incompatible revision.
    #[error("snapshot version mismatch: found {found}, expected {expected}")]
    SnapshotVersion { found: u32, expected: u32 },

    /// Stream token already consumed or never issued.
    #[error("no pending request")]
    NoPendingRequest,

    /// The invocation exceeded its time budget.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// Workflow graph construction or traversal error.
    #[error("workflow graph error: {0}")]
    Graph(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Durable store errors
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl ClaimflowError {
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    pub fn responder(agent: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Responder {
            agent,
            message: message.into(),
            retryable,
        }
    }

    /// Whether the workflow engine may re-run the failed node.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Responder { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_flagged_responder_errors_are_retryable() {
        assert!(ClaimflowError::responder("benefit", "timeout", true).is_retryable());
        assert!(!ClaimflowError::responder("summary", "bad prompt", false).is_retryable());
        assert!(!ClaimflowError::retrieval("index down").is_retryable());
        assert!(!ClaimflowError::NoPendingRequest.is_retryable());
    }

    #[test]
    fn test_display_includes_agent() {
        let err = ClaimflowError::responder("claim", "connection reset", true);
        assert!(err.to_string().contains("claim"));
        assert!(err.to_string().contains("connection reset"));
    }
}
