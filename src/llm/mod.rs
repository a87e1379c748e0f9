// SPDX-License-Identifier: MIT

//! Model-facing kit - traits for the external model services
//!
//! This module defines the contracts the orchestrator consumes:
//! - `GenerativeModel` - streaming text generation
//! - `Embedder` - text embeddings, unit-normalized
//! - `Reranker` - cross-encoder relevance scoring
//!
//! HTTP implementations live in their own submodules:
//! - [tgi] - text-generation-inference streaming endpoint
//! - [embed] - text-embeddings-inference embed endpoint
//! - [rerank] - text-embeddings-inference rerank endpoint

pub mod embed;
pub mod error;
pub mod rerank;
pub mod tgi;

pub use embed::{normalize, Embedder, TeiEmbedder};
pub use error::ModelError;
pub use rerank::{Reranker, TeiReranker};
pub use tgi::TgiModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Model metadata recorded in provenance entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub quantization: Option<String>,
}

/// Core trait for streaming generative models.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Metadata for provenance recording.
    fn info(&self) -> ModelInfo;

    /// Generate a completion for `prompt`, sending each text increment to
    /// `chunks` as it arrives, and return the concatenated full answer.
    ///
    /// Increment granularity is not guaranteed - a backend may deliver the
    /// whole answer as a single increment.
    async fn stream(
        &self,
        prompt: &str,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<String, ModelError>;
}
