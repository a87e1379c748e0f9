// SPDX-License-Identifier: MIT

//! Environment-driven configuration
//!
//! All settings come from the environment (with `.env` loaded at the binary
//! edge) so the same build runs against local or hosted model services.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path.
    pub db_path: String,
    /// HTTP listen port.
    pub port: u16,

    /// Base URL of the text-generation-inference endpoint.
    pub generator_url: String,
    /// Model identifier recorded in provenance.
    pub generator_model: String,
    /// Quantization label recorded in provenance, if any.
    pub generator_quantization: Option<String>,
    /// Base URL of the embedding endpoint.
    pub embeddings_url: String,
    /// Base URL of the reranker endpoint.
    pub reranker_url: String,
    /// Bearer token for hosted inference endpoints.
    pub hf_token: Option<String>,

    /// Benefit and claim document files loaded into the in-memory indexes.
    pub benefits_path: String,
    pub claims_path: String,

    /// Router: best class below this score asks for clarification.
    pub clarify_threshold: f32,
    /// Router: benefit and claim both above this score routes to both.
    pub both_threshold: f32,

    /// Candidates fetched from the vector index per query.
    pub retrieval_k: usize,
    /// Candidates kept after reranking.
    pub final_k: usize,

    pub max_new_tokens: u32,
    /// Whole-invocation time budget.
    pub invocation_timeout: Duration,
    /// Also checkpoint after each successful specialist node, not just on
    /// the clarify path.
    pub checkpoint_on_success: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_path: var_or("DB_PATH", "db/app.db"),
            port: parse_or("PORT", 8000),
            generator_url: var_or("GENERATOR_URL", "http://127.0.0.1:8081"),
            generator_model: var_or("GENERATOR_MODEL", "Qwen/Qwen2.5-7B-Instruct"),
            generator_quantization: env::var("GENERATOR_QUANTIZATION").ok(),
            embeddings_url: var_or("EMBEDDINGS_URL", "http://127.0.0.1:8082"),
            reranker_url: var_or("RERANKER_URL", "http://127.0.0.1:8083"),
            hf_token: env::var("HF_TOKEN").ok(),
            benefits_path: var_or("BENEFITS_PATH", "data/benefits.json"),
            claims_path: var_or("CLAIMS_PATH", "data/claims.json"),
            clarify_threshold: parse_or("CLARIFY_THRESHOLD", 0.30),
            both_threshold: parse_or("BOTH_THRESHOLD", 0.45),
            retrieval_k: parse_or("RETRIEVAL_K", 8),
            final_k: parse_or("FINAL_K", 4),
            max_new_tokens: parse_or("LLM_MAX_TOKENS", 512),
            invocation_timeout: Duration::from_secs(parse_or("INVOCATION_TIMEOUT_SECS", 120)),
            checkpoint_on_success: parse_or("CHECKPOINT_ON_SUCCESS", false),
        }
    }
}
