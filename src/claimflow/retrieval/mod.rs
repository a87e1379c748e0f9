// SPDX-License-Identifier: MIT

//! Evidence retrieval
//!
//! Candidates come from a domain-scoped vector index (benefit and claim
//! documents are separate collections, never mixed), optionally restricted
//! by a hard metadata filter, then reranked by a cross-encoder scorer.

mod memory;
mod pipeline;

pub use memory::InMemoryIndex;
pub use pipeline::RetrievalPipeline;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ClaimflowError;
use super::state::Metadata;

/// Which document collection a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Benefit,
    Claim,
}

impl Domain {
    pub fn collection(&self) -> &'static str {
        match self {
            Domain::Benefit => "benefit_docs",
            Domain::Claim => "claim_docs",
        }
    }
}

/// An evidence candidate returned by the retrieval stage. Ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Hard equality constraint applied before semantic scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

/// Nearest-neighbor index over one document collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn collection(&self) -> &str;

    /// Top-k candidates by similarity, restricted to `filter` when present.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, ClaimflowError>;

    /// Exact lookup by document id, for the identifier quick path.
    async fn get(&self, id: &str) -> Result<Option<Candidate>, ClaimflowError>;
}

static MEMBER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bM\d{6,10}\b").expect("member id pattern"));

/// Extract a member identifier from a query, if the query names one.
pub fn extract_member_id(query: &str) -> Option<String> {
    MEMBER_ID.find(query).map(|m| m.as_str().to_string())
}
