// SPDX-License-Identifier: MIT

//! In-memory vector index
//!
//! Documents are loaded from a JSON file (one array of flat objects, as the
//! ingest tooling produces), embedded once at load, and scored by dot
//! product - embeddings are unit-normalized so this is cosine similarity.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::{Candidate, MetadataFilter, VectorIndex};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::state::Metadata;
use crate::llm::Embedder;

struct IndexedDoc {
    id: String,
    text: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

pub struct InMemoryIndex {
    collection: String,
    docs: Vec<IndexedDoc>,
}

impl InMemoryIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            docs: Vec::new(),
        }
    }

    /// Add one pre-embedded document. Mainly for tests and small fixtures.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>, metadata: Metadata, embedding: Vec<f32>) {
        self.docs.push(IndexedDoc {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Load a JSON array of flat document objects, embedding each one.
    ///
    /// Each object contributes its serialized form as the candidate text and
    /// its scalar fields as metadata; `benefit_id`/`claim_id` become the
    /// document id.
    pub async fn load_documents(
        collection: impl Into<String>,
        path: &Path,
        embedder: &dyn Embedder,
    ) -> Result<Self, ClaimflowError> {
        let collection = collection.into();
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<Value> = serde_json::from_str(&raw)?;

        let mut index = Self::new(collection);
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| index.collection.clone());

        for item in items {
            let Some(obj) = item.as_object() else {
                log::warn!("skipping non-object document in {}", source);
                continue;
            };

            let id = obj
                .get("benefit_id")
                .or_else(|| obj.get("claim_id"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

            let mut metadata = Metadata::new();
            metadata.insert("source".into(), source.clone());
            for (key, value) in obj {
                match value {
                    Value::String(s) => {
                        metadata.insert(key.clone(), s.clone());
                    }
                    Value::Number(n) => {
                        metadata.insert(key.clone(), n.to_string());
                    }
                    Value::Bool(b) => {
                        metadata.insert(key.clone(), b.to_string());
                    }
                    _ => {}
                }
            }

            let text = serde_json::to_string(obj)?;
            let embedding = embedder
                .embed(&text)
                .await
                .map_err(|e| ClaimflowError::retrieval(format!("embedding document {}: {}", id, e)))?;

            index.insert(id, text, metadata, embedding);
        }

        log::info!(
            "loaded {} documents into collection {}",
            index.len(),
            index.collection
        );
        Ok(index)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, ClaimflowError> {
        let mut scored: Vec<(f32, &IndexedDoc)> = self
            .docs
            .iter()
            .filter(|doc| match filter {
                Some(f) => doc.metadata.get(&f.field) == Some(&f.value),
                None => true,
            })
            .map(|doc| (dot(&doc.embedding, embedding), doc))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, doc)| Candidate {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Candidate>, ClaimflowError> {
        Ok(self.docs.iter().find(|d| d.id == id).map(|doc| Candidate {
            id: doc.id.clone(),
            text: doc.text.clone(),
            metadata: doc.metadata.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn index_with_three_docs() -> InMemoryIndex {
        let mut index = InMemoryIndex::new("benefit_docs");
        index.insert("a", "doc a", meta(&[("member_id", "M111111")]), vec![1.0, 0.0]);
        index.insert("b", "doc b", meta(&[("member_id", "M222222")]), vec![0.8, 0.2]);
        index.insert("c", "doc c", meta(&[("member_id", "M111111")]), vec![0.0, 1.0]);
        index
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = index_with_three_docs();
        let results = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
    }

    #[tokio::test]
    async fn test_query_hard_filter_restricts_candidates() {
        let index = index_with_three_docs();
        let filter = MetadataFilter {
            field: "member_id".into(),
            value: "M111111".into(),
        };
        let results = index.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| c.metadata["member_id"] == "M111111"));
    }

    #[tokio::test]
    async fn test_query_empty_index() {
        let index = InMemoryIndex::new("claim_docs");
        let results = index.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let index = index_with_three_docs();
        let found = index.get("b").await.unwrap();
        assert_eq!(found.unwrap().text, "doc b");
        assert!(index.get("missing").await.unwrap().is_none());
    }
}
