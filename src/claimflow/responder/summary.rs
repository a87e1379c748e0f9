// SPDX-License-Identifier: MIT

//! Summary responder
//!
//! Merges the benefit and claim answers into one final summary. Failures
//! here are fatal to the invocation: the error is never flagged retryable.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::{generate_streaming, ResponderOutput};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::events::SessionEvent;
use crate::claimflow::state::ProvenanceEntry;
use crate::claimflow::store::ProvenanceLedger;
use crate::llm::GenerativeModel;

const AGENT: &str = "summary";

fn prompt(benefit: &str, claim: &str) -> String {
    format!(
        "Merge the BENEFIT and CLAIM results into at most 3 bullets, then a 'Next steps' list.\n\
         Benefit:\n{benefit}\n\
         Claim:\n{claim}\n"
    )
}

pub struct SummaryResponder {
    model: Arc<dyn GenerativeModel>,
    ledger: Arc<ProvenanceLedger>,
}

impl SummaryResponder {
    pub fn new(model: Arc<dyn GenerativeModel>, ledger: Arc<ProvenanceLedger>) -> Self {
        Self { model, ledger }
    }

    pub async fn run(
        &self,
        benefit_result: Option<&str>,
        claim_result: Option<&str>,
        session_id: &str,
        events: Option<&mpsc::Sender<SessionEvent>>,
    ) -> Result<ResponderOutput, ClaimflowError> {
        let benefit = benefit_result.unwrap_or("");
        let claim = claim_result.unwrap_or("");

        let answer = generate_streaming(self.model.as_ref(), &prompt(benefit, claim), events)
            .await
            .map_err(|e| ClaimflowError::responder(AGENT, e.to_string(), false))?;

        let info = self.model.info();
        self.ledger.append(
            session_id,
            AGENT,
            &info.model_name,
            info.quantization.as_deref(),
            &[],
        )?;

        Ok(ResponderOutput {
            answer,
            provenance: vec![ProvenanceEntry {
                agent: AGENT.into(),
                model_name: info.model_name,
                quantization: info.quantization,
                sources: Vec::new(),
            }],
        })
    }
}
