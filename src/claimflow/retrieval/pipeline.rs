// SPDX-License-Identifier: MIT

//! Retrieve -> hybrid filter -> rerank -> truncate
//!
//! When the query names a member identifier it becomes a hard equality
//! filter: only that member's documents are eligible candidates, regardless
//! of semantic score. An empty candidate set short-circuits before the
//! reranker is ever invoked.

use std::sync::Arc;

use super::{extract_member_id, Candidate, Domain, MetadataFilter, VectorIndex};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::state::SourceRef;
use crate::llm::{Embedder, Reranker};

pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    benefit_index: Arc<dyn VectorIndex>,
    claim_index: Arc<dyn VectorIndex>,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        benefit_index: Arc<dyn VectorIndex>,
        claim_index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            reranker,
            benefit_index,
            claim_index,
        }
    }

    fn index_for(&self, domain: Domain) -> &Arc<dyn VectorIndex> {
        match domain {
            Domain::Benefit => &self.benefit_index,
            Domain::Claim => &self.claim_index,
        }
    }

    /// Retrieve up to `k` candidates, rerank, and keep the top `final_k`.
    ///
    /// Returns the double-newline-joined context text and one provenance
    /// source per selected candidate.
    pub async fn search(
        &self,
        query: &str,
        domain: Domain,
        k: usize,
        final_k: usize,
    ) -> Result<(String, Vec<SourceRef>), ClaimflowError> {
        let filter = extract_member_id(query).map(|value| {
            log::debug!("hard member filter extracted: {}", value);
            MetadataFilter {
                field: "member_id".into(),
                value,
            }
        });

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| ClaimflowError::retrieval(format!("query embedding: {}", e)))?;

        let index = self.index_for(domain);
        let candidates = index.query(&embedding, k, filter.as_ref()).await?;
        if candidates.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut scored: Vec<(f32, Candidate)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let score = self
                .reranker
                .score(query, &candidate.text)
                .await
                .map_err(|e| ClaimflowError::retrieval(format!("reranking: {}", e)))?;
            scored.push((score, candidate));
        }

        // Stable sort: ties keep original retrieval order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(final_k);

        let context = scored
            .iter()
            .map(|(_, c)| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let collection = index.collection().to_string();
        let sources = scored
            .into_iter()
            .map(|(_, c)| SourceRef {
                file: c
                    .metadata
                    .get("source")
                    .cloned()
                    .unwrap_or_else(|| collection.clone()),
                doc_id: Some(c.id),
                offsets: Vec::new(),
                member_id: c.metadata.get("member_id").cloned(),
            })
            .collect();

        Ok((context, sources))
    }
}
