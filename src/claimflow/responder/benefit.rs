// SPDX-License-Identifier: MIT

//! Benefit responder

use std::sync::Arc;
use tokio::sync::mpsc;

use super::{
    exact_object_id, generate_streaming, source_from, structured_answer, ResponderOutput,
    DIRECT_LOOKUP,
};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::events::SessionEvent;
use crate::claimflow::retrieval::{Domain, RetrievalPipeline, VectorIndex};
use crate::claimflow::state::ProvenanceEntry;
use crate::claimflow::store::ProvenanceLedger;
use crate::llm::GenerativeModel;

const AGENT: &str = "benefit";

fn prompt(question: &str, context: &str) -> String {
    format!(
        "You are the benefits responder. Use ONLY the provided context to answer.\n\
         Question: {question}\n\
         Context:\n{context}\n\
         Respond with up to 4 bullets of factual policy language. If data is missing, ask ONE specific question.\n"
    )
}

pub struct BenefitResponder {
    model: Arc<dyn GenerativeModel>,
    pipeline: Arc<RetrievalPipeline>,
    index: Arc<dyn VectorIndex>,
    ledger: Arc<ProvenanceLedger>,
    retrieval_k: usize,
    final_k: usize,
}

impl BenefitResponder {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        pipeline: Arc<RetrievalPipeline>,
        index: Arc<dyn VectorIndex>,
        ledger: Arc<ProvenanceLedger>,
        retrieval_k: usize,
        final_k: usize,
    ) -> Self {
        Self {
            model,
            pipeline,
            index,
            ledger,
            retrieval_k,
            final_k,
        }
    }

    pub async fn run(
        &self,
        question: &str,
        session_id: &str,
        events: Option<&mpsc::Sender<SessionEvent>>,
    ) -> Result<ResponderOutput, ClaimflowError> {
        // Exact identifier quick path: answer from the record's structured
        // fields, no retrieval or generation.
        if let Some(object_id) = exact_object_id(question, "benefit_") {
            if let Some(candidate) = self.index.get(&object_id).await? {
                log::info!("benefit responder answering {} from structured fields", object_id);
                let sources = vec![source_from(&candidate, self.index.collection())];
                self.ledger
                    .append(session_id, AGENT, DIRECT_LOOKUP, None, &sources)?;
                return Ok(ResponderOutput {
                    answer: structured_answer(&candidate),
                    provenance: vec![ProvenanceEntry {
                        agent: AGENT.into(),
                        model_name: DIRECT_LOOKUP.into(),
                        quantization: None,
                        sources,
                    }],
                });
            }
        }

        let (context, sources) = self
            .pipeline
            .search(question, Domain::Benefit, self.retrieval_k, self.final_k)
            .await?;

        let answer = generate_streaming(self.model.as_ref(), &prompt(question, &context), events)
            .await
            .map_err(|e| ClaimflowError::responder(AGENT, e.to_string(), e.is_retryable()))?;

        let info = self.model.info();
        self.ledger.append(
            session_id,
            AGENT,
            &info.model_name,
            info.quantization.as_deref(),
            &sources,
        )?;

        Ok(ResponderOutput {
            answer,
            provenance: vec![ProvenanceEntry {
                agent: AGENT.into(),
                model_name: info.model_name,
                quantization: info.quantization,
                sources,
            }],
        })
    }
}
