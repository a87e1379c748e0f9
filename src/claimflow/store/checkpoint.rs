// SPDX-License-Identifier: MIT

//! Checkpoint store
//!
//! A checkpoint is a durable, single-use snapshot of a paused workflow.
//! There is no update operation: replacing a checkpoint is delete-then-
//! create. Consumption on resume goes through `take`, a single transaction
//! whose delete decides the winner under concurrent resumes.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{new_id, now, Db};
use crate::claimflow::error::ClaimflowError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub user_id: String,
    pub session_id: String,
    pub pending_agent: String,
    pub pending_question: String,
    pub context_snapshot: String,
    pub created_at: String,
}

/// Listing row without the (potentially large) snapshot payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: String,
    pub pending_agent: String,
    pub pending_question: String,
    pub created_at: String,
}

pub struct CheckpointStore {
    db: Arc<Db>,
}

impl CheckpointStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        user_id: &str,
        session_id: &str,
        pending_agent: &str,
        pending_question: &str,
        context_snapshot: &str,
    ) -> Result<String, ClaimflowError> {
        let checkpoint_id = new_id();
        self.db.conn().execute(
            "INSERT INTO checkpoints
             (checkpoint_id, user_id, session_id, pending_agent, pending_question, context_snapshot, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                checkpoint_id,
                user_id,
                session_id,
                pending_agent,
                pending_question,
                context_snapshot,
                now()
            ],
        )?;
        log::debug!(
            "checkpoint {} saved for agent={} session={}",
            checkpoint_id,
            pending_agent,
            session_id
        );
        Ok(checkpoint_id)
    }

    pub fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, ClaimflowError> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT checkpoint_id, user_id, session_id, pending_agent, pending_question, context_snapshot, created_at
                 FROM checkpoints WHERE checkpoint_id = ?1",
                params![checkpoint_id],
                row_to_checkpoint,
            )
            .optional()?;
        Ok(row)
    }

    /// Idempotent: deleting a missing checkpoint is not an error.
    pub fn delete(&self, checkpoint_id: &str) -> Result<(), ClaimflowError> {
        self.db.conn().execute(
            "DELETE FROM checkpoints WHERE checkpoint_id = ?1",
            params![checkpoint_id],
        )?;
        Ok(())
    }

    /// Read and delete in one transaction. Of two concurrent resumes only
    /// one observes the row; the other sees not-found.
    pub fn take(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, ClaimflowError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT checkpoint_id, user_id, session_id, pending_agent, pending_question, context_snapshot, created_at
                 FROM checkpoints WHERE checkpoint_id = ?1",
                params![checkpoint_id],
                row_to_checkpoint,
            )
            .optional()?;
        if row.is_some() {
            tx.execute(
                "DELETE FROM checkpoints WHERE checkpoint_id = ?1",
                params![checkpoint_id],
            )?;
        }
        tx.commit()?;
        Ok(row)
    }

    pub fn list_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<CheckpointSummary>, ClaimflowError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT checkpoint_id, pending_agent, pending_question, created_at
             FROM checkpoints WHERE session_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(CheckpointSummary {
                    checkpoint_id: row.get(0)?,
                    pending_agent: row.get(1)?,
                    pending_question: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    Ok(Checkpoint {
        checkpoint_id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        pending_agent: row.get(3)?,
        pending_question: row.get(4)?,
        context_snapshot: row.get(5)?,
        created_at: row.get(6)?,
    })
}
