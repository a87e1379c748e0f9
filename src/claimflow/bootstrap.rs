// SPDX-License-Identifier: MIT

//! Warm-up wiring
//!
//! Builds the store, model clients, indexes, classifier, responders and the
//! workflow graph from configuration. The semantic classifier is
//! best-effort: if the embedding backend is unreachable at warm-up the
//! router runs lexical-only and the process still starts.

use std::path::Path;
use std::sync::Arc;

use super::config::Config;
use super::error::ClaimflowError;
use super::graph::nodes::build_workflow;
use super::responder::{BenefitResponder, ClaimResponder, SummaryResponder};
use super::retrieval::{InMemoryIndex, RetrievalPipeline, VectorIndex};
use super::router::{Router, SemanticClassifier};
use super::server::AppState;
use super::session::SessionManager;
use super::store::{CheckpointStore, Db, ProvenanceLedger, SessionStore};
use crate::llm::{Embedder, GenerativeModel, Reranker, TeiEmbedder, TeiReranker, TgiModel};

async fn load_index(
    collection: &str,
    path: &str,
    embedder: &dyn Embedder,
) -> Arc<dyn VectorIndex> {
    match InMemoryIndex::load_documents(collection, Path::new(path), embedder).await {
        Ok(index) => Arc::new(index),
        Err(e) => {
            log::warn!(
                "could not load {} from {}: {} - starting with an empty collection",
                collection,
                path,
                e
            );
            Arc::new(InMemoryIndex::new(collection))
        }
    }
}

pub async fn build(config: &Config) -> Result<AppState, ClaimflowError> {
    let db = Db::open(&config.db_path)?;
    let checkpoints = Arc::new(CheckpointStore::new(db.clone()));
    let ledger = Arc::new(ProvenanceLedger::new(db.clone()));
    let sessions = Arc::new(SessionStore::new(db));

    let model: Arc<dyn GenerativeModel> = Arc::new(TgiModel::new(
        &config.generator_url,
        config.hf_token.clone(),
        &config.generator_model,
        config.generator_quantization.clone(),
        config.max_new_tokens,
    ));
    let embedder: Arc<dyn Embedder> = Arc::new(TeiEmbedder::new(
        &config.embeddings_url,
        config.hf_token.clone(),
    ));
    let reranker: Arc<dyn Reranker> = Arc::new(TeiReranker::new(
        &config.reranker_url,
        config.hf_token.clone(),
    ));

    let benefit_index = load_index("benefit_docs", &config.benefits_path, embedder.as_ref()).await;
    let claim_index = load_index("claim_docs", &config.claims_path, embedder.as_ref()).await;

    let pipeline = Arc::new(RetrievalPipeline::new(
        embedder.clone(),
        reranker,
        benefit_index.clone(),
        claim_index.clone(),
    ));

    let classifier = match SemanticClassifier::new(
        embedder.clone(),
        config.clarify_threshold,
        config.both_threshold,
    )
    .await
    {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            log::warn!("semantic classifier unavailable, routing lexically: {}", e);
            None
        }
    };
    let router = Arc::new(Router::new(classifier));

    let benefit = Arc::new(BenefitResponder::new(
        model.clone(),
        pipeline.clone(),
        benefit_index,
        ledger.clone(),
        config.retrieval_k,
        config.final_k,
    ));
    let claim = Arc::new(ClaimResponder::new(
        model.clone(),
        pipeline,
        claim_index,
        ledger.clone(),
        config.retrieval_k,
        config.final_k,
    ));
    let summary = Arc::new(SummaryResponder::new(model, ledger.clone()));

    let graph = Arc::new(build_workflow(
        router,
        benefit,
        claim,
        summary,
        checkpoints.clone(),
        config.checkpoint_on_success,
    )?);

    let manager = Arc::new(SessionManager::new(
        graph,
        checkpoints.clone(),
        sessions.clone(),
        config.invocation_timeout,
    ));

    log::info!("responders initialized and workflow graph built");
    Ok(AppState {
        manager,
        ledger,
        checkpoints,
        sessions,
    })
}
