// SPDX-License-Identifier: MIT

//! claimflow-rs - insurance benefits/claims question-answering orchestrator
//!
//! A fixed workflow graph routes each question to specialist responders
//! backed by a retrieval-and-rerank pipeline, merges results into a summary,
//! records provenance, and can pause on a clarifying question via single-use
//! checkpoints.

pub mod claimflow;
pub mod llm;
