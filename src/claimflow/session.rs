// SPDX-License-Identifier: MIT

//! Session/Stream Manager
//!
//! Accepts fresh questions and checkpoint resumes, hands out single-use
//! stream tokens, and runs each graph invocation on its own task under a
//! time budget so the transport stays responsive. Every stream delivers
//! zero or more token events, then exactly one meta and one done - or
//! exactly one error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::ClaimflowError;
use super::events::{MetaPayload, SessionEvent};
use super::graph::{InvocationCtx, WorkflowGraph};
use super::state::{StateSnapshot, WorkflowState, CLARIFY_QUESTION};
use super::store::{CheckpointStore, SessionStore};

enum PendingRequest {
    Fresh {
        session_id: String,
        user_id: String,
        text: String,
    },
    Resume {
        checkpoint_id: String,
        text: String,
    },
}

struct Inner {
    graph: Arc<WorkflowGraph>,
    checkpoints: Arc<CheckpointStore>,
    sessions: Arc<SessionStore>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    invocation_timeout: Duration,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        graph: Arc<WorkflowGraph>,
        checkpoints: Arc<CheckpointStore>,
        sessions: Arc<SessionStore>,
        invocation_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                graph,
                checkpoints,
                sessions,
                pending: Mutex::new(HashMap::new()),
                invocation_timeout,
            }),
        }
    }

    /// Queue a fresh question. Returns the single-use stream token.
    pub fn enqueue(&self, session_id: &str, user_id: &str, text: &str) -> String {
        self.inner.issue_token(PendingRequest::Fresh {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
        })
    }

    /// Queue a resume. Validates the checkpoint exists now; the actual
    /// consumption happens when the stream opens. Returns the token and the
    /// checkpoint's session id.
    pub fn enqueue_resume(
        &self,
        checkpoint_id: &str,
        text: &str,
    ) -> Result<(String, String), ClaimflowError> {
        let checkpoint = self
            .inner
            .checkpoints
            .get(checkpoint_id)?
            .ok_or_else(|| ClaimflowError::CheckpointNotFound(checkpoint_id.to_string()))?;

        let token = self.inner.issue_token(PendingRequest::Resume {
            checkpoint_id: checkpoint_id.to_string(),
            text: text.to_string(),
        });
        Ok((token, checkpoint.session_id))
    }

    /// Consume a token and start its invocation in the background.
    ///
    /// A token is consumed at most once: a second call for the same token
    /// fails with `NoPendingRequest`.
    pub fn begin(&self, token: &str) -> Result<mpsc::Receiver<SessionEvent>, ClaimflowError> {
        let request = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
            .ok_or(ClaimflowError::NoPendingRequest)?;

        let (tx, rx) = mpsc::channel(64);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = inner.execute(request, &tx).await {
                log::error!("invocation failed: {}", e);
                let _ = tx.send(SessionEvent::Error(e.to_string())).await;
            }
        });
        Ok(rx)
    }
}

impl Inner {
    fn issue_token(&self, request: PendingRequest) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), request);
        token
    }

    async fn execute(
        &self,
        request: PendingRequest,
        tx: &mpsc::Sender<SessionEvent>,
    ) -> Result<(), ClaimflowError> {
        let state = self.build_state(request)?;
        let session_id = state.session_id.clone();

        let ctx = InvocationCtx::streaming(tx.clone());
        let final_state =
            tokio::time::timeout(self.invocation_timeout, self.graph.invoke(state, &ctx))
                .await
                .map_err(|_| ClaimflowError::Timeout(self.invocation_timeout))??;

        let (agent, text) = if final_state.is_paused() {
            ("orchestrator", CLARIFY_QUESTION.to_string())
        } else {
            ("summary", final_state.summary.clone().unwrap_or_default())
        };

        self.sessions
            .record_message(&session_id, "assistant", &text, agent)?;

        let meta = MetaPayload {
            agent: agent.to_string(),
            text,
            provenance: final_state.provenance,
            checkpoint_id: final_state.checkpoint_id,
        };
        let _ = tx.send(SessionEvent::Meta(meta)).await;
        let _ = tx.send(SessionEvent::Done).await;
        log::info!("invocation complete for session={}", session_id);
        Ok(())
    }

    fn build_state(&self, request: PendingRequest) -> Result<WorkflowState, ClaimflowError> {
        match request {
            PendingRequest::Fresh {
                session_id,
                user_id,
                text,
            } => {
                self.sessions
                    .record_message(&session_id, "user", &text, "user")?;
                Ok(WorkflowState::new(session_id, user_id, text))
            }
            PendingRequest::Resume {
                checkpoint_id,
                text,
            } => {
                // Delete-before-use: under concurrent resumes only the
                // first `take` sees the row.
                let checkpoint = self
                    .checkpoints
                    .take(&checkpoint_id)?
                    .ok_or(ClaimflowError::CheckpointNotFound(checkpoint_id))?;

                let mut state = match StateSnapshot::decode(&checkpoint.context_snapshot) {
                    Ok(state) => state,
                    Err(e) => {
                        // The snapshot came from an incompatible revision.
                        // Discard it wholesale and rebuild from the
                        // checkpoint row so the request still completes.
                        log::warn!(
                            "checkpoint {} snapshot unusable ({}), rebuilding from row",
                            checkpoint.checkpoint_id,
                            e
                        );
                        WorkflowState::new(
                            checkpoint.session_id.clone(),
                            checkpoint.user_id.clone(),
                            checkpoint.pending_question.clone(),
                        )
                    }
                };

                // The answer to the clarifying question is re-routed, not
                // assumed to resolve the ambiguity.
                state.question = text.clone();
                state.checkpoint_id = None;

                self.sessions
                    .record_message(&state.session_id, "user", &text, "user")?;
                Ok(state)
            }
        }
    }
}
