// SPDX-License-Identifier: MIT

//! Workflow nodes and the fixed question-answering graph
//!
//! Node set: router, benefit, claim, summary, clarify. The "both" route is
//! strictly sequential - benefit runs before claim - which keeps provenance
//! order deterministic. Every path ends at the terminal: unroutable
//! questions go through clarify, which checkpoints the state and asks the
//! user to disambiguate.

use async_trait::async_trait;
use std::sync::Arc;

use super::{GraphBuilder, InvocationCtx, Node, WorkflowGraph, END};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::responder::{BenefitResponder, ClaimResponder, SummaryResponder};
use crate::claimflow::router::Router;
use crate::claimflow::state::{Route, StateSnapshot, WorkflowState, CLARIFY_QUESTION};
use crate::claimflow::store::CheckpointStore;

fn save_checkpoint(
    store: &CheckpointStore,
    state: &mut WorkflowState,
    pending_agent: &str,
    pending_question: &str,
) -> Result<(), ClaimflowError> {
    let snapshot = StateSnapshot::encode(state)?;
    let checkpoint_id = store.create(
        &state.user_id,
        &state.session_id,
        pending_agent,
        pending_question,
        &snapshot,
    )?;
    state.checkpoint_id = Some(checkpoint_id);
    Ok(())
}

pub struct RouterNode {
    router: Arc<Router>,
}

#[async_trait]
impl Node for RouterNode {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        _ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let decision = self.router.classify(&state.question).await;
        state.route = decision.route;
        state.route_confidence = decision.semantic.then_some(decision.confidence);
        log::info!(
            "router decided route={} confidence={:.2} for question='{}'",
            state.route,
            decision.confidence,
            state.question
        );
        Ok(state)
    }
}

pub struct BenefitNode {
    responder: Arc<BenefitResponder>,
    checkpoints: Arc<CheckpointStore>,
    checkpoint_on_success: bool,
}

#[async_trait]
impl Node for BenefitNode {
    fn name(&self) -> &'static str {
        "benefit"
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let output = self
            .responder
            .run(&state.question, &state.session_id, ctx.events.as_ref())
            .await?;
        state.benefit_result = Some(output.answer);
        state.provenance.extend(output.provenance);
        if self.checkpoint_on_success {
            let question = state.question.clone();
            save_checkpoint(&self.checkpoints, &mut state, "benefit", &question)?;
        }
        Ok(state)
    }
}

pub struct ClaimNode {
    responder: Arc<ClaimResponder>,
    checkpoints: Arc<CheckpointStore>,
    checkpoint_on_success: bool,
}

#[async_trait]
impl Node for ClaimNode {
    fn name(&self) -> &'static str {
        "claim"
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let output = self
            .responder
            .run(&state.question, &state.session_id, ctx.events.as_ref())
            .await?;
        state.claim_result = Some(output.answer);
        state.provenance.extend(output.provenance);
        if self.checkpoint_on_success {
            let question = state.question.clone();
            save_checkpoint(&self.checkpoints, &mut state, "claim", &question)?;
        }
        Ok(state)
    }
}

pub struct SummaryNode {
    responder: Arc<SummaryResponder>,
    checkpoints: Arc<CheckpointStore>,
    checkpoint_on_success: bool,
}

#[async_trait]
impl Node for SummaryNode {
    fn name(&self) -> &'static str {
        "summary"
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let output = self
            .responder
            .run(
                state.benefit_result.as_deref(),
                state.claim_result.as_deref(),
                &state.session_id,
                ctx.events.as_ref(),
            )
            .await?;

        let answer = if output.answer.trim().is_empty() {
            "(no summary generated)".to_string()
        } else {
            output.answer
        };
        state.summary = Some(answer);
        state.provenance.extend(output.provenance);
        if self.checkpoint_on_success {
            let question = state.question.clone();
            save_checkpoint(&self.checkpoints, &mut state, "summary", &question)?;
        }
        Ok(state)
    }
}

/// Pauses the workflow: snapshots the full pre-clarify state and asks the
/// user one specific disambiguating question.
pub struct ClarifyNode {
    checkpoints: Arc<CheckpointStore>,
}

#[async_trait]
impl Node for ClarifyNode {
    fn name(&self) -> &'static str {
        "clarify"
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        _ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        save_checkpoint(&self.checkpoints, &mut state, "orchestrator", CLARIFY_QUESTION)?;
        log::info!(
            "clarify checkpoint {} written for session={}",
            state.checkpoint_id.as_deref().unwrap_or("-"),
            state.session_id
        );
        Ok(state)
    }
}

/// Assemble the fixed question-answering graph.
pub fn build_workflow(
    router: Arc<Router>,
    benefit: Arc<BenefitResponder>,
    claim: Arc<ClaimResponder>,
    summary: Arc<SummaryResponder>,
    checkpoints: Arc<CheckpointStore>,
    checkpoint_on_success: bool,
) -> Result<WorkflowGraph, ClaimflowError> {
    GraphBuilder::new()
        .add_node(Arc::new(RouterNode { router }))
        .add_node(Arc::new(BenefitNode {
            responder: benefit,
            checkpoints: checkpoints.clone(),
            checkpoint_on_success,
        }))
        .add_node(Arc::new(ClaimNode {
            responder: claim,
            checkpoints: checkpoints.clone(),
            checkpoint_on_success,
        }))
        .add_node(Arc::new(SummaryNode {
            responder: summary,
            checkpoints: checkpoints.clone(),
            checkpoint_on_success,
        }))
        .add_node(Arc::new(ClarifyNode { checkpoints }))
        .set_entry("router")
        .add_conditional_edges(
            "router",
            |state| state.route.as_str().to_string(),
            &[
                ("benefit", "benefit"),
                ("claim", "claim"),
                ("both", "benefit"),
                ("clarify", "clarify"),
                ("unknown", "clarify"),
            ],
        )
        .add_conditional_edges(
            "benefit",
            |state| {
                if state.route == Route::Both {
                    "claim".to_string()
                } else {
                    "summary".to_string()
                }
            },
            &[("claim", "claim"), ("summary", "summary")],
        )
        .add_edge("claim", "summary")
        .add_edge("summary", END)
        .add_edge("clarify", END)
        .compile()
}
