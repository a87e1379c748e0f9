// SPDX-License-Identifier: MIT

//! Embedding model client
//!
//! Embeddings are used both for retrieval candidate scoring and for router
//! classification. Vectors are normalized to unit length on the client side
//! so cosine similarity reduces to a dot product.

use super::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a fixed-length unit-normalized vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Client for a text-embeddings-inference `/embed` endpoint.
pub struct TeiEmbedder {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TeiEmbedder {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let url = format!("{}/embed", self.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(&json!({ "inputs": [text] }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::api("tei-embed", format!("{}: {}", status, body)));
        }

        let vectors: Vec<Vec<f32>> = resp.json().await?;
        let mut vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::invalid("tei-embed", "empty embedding batch"))?;
        normalize(&mut vector);
        Ok(vector)
    }
}
