// SPDX-License-Identifier: MIT

//! Cross-encoder reranker client

use super::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Trait for relevance scorers taking (query, candidate-text) pairs.
///
/// Higher scores mean more relevant.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, text: &str) -> Result<f32, ModelError>;
}

/// Client for a text-embeddings-inference `/rerank` endpoint.
pub struct TeiReranker {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TeiReranker {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Reranker for TeiReranker {
    async fn score(&self, query: &str, text: &str) -> Result<f32, ModelError> {
        let url = format!("{}/rerank", self.base_url.trim_end_matches('/'));
        let mut req = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "texts": [text] }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::api(
                "tei-rerank",
                format!("{}: {}", status, body),
            ));
        }

        let ranks: Vec<Value> = resp.json().await?;
        ranks
            .first()
            .and_then(|r| r["score"].as_f64())
            .map(|s| s as f32)
            .ok_or_else(|| ModelError::invalid("tei-rerank", "missing score in response"))
    }
}
