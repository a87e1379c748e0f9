// SPDX-License-Identifier: MIT

//! Durable storage
//!
//! SQLite-backed checkpoint store, provenance ledger and session
//! bookkeeping. The ledger and checkpoints are the audit surface: ledger
//! rows are append-only, checkpoints are create/get/delete with no update.

mod checkpoint;
mod provenance;
mod session;

pub use checkpoint::{Checkpoint, CheckpointStore, CheckpointSummary};
pub use provenance::{ProvenanceLedger, StoredProvenance};
pub use session::SessionStore;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::ClaimflowError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    title      TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    agent      TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id    TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL,
    session_id       TEXT NOT NULL,
    pending_agent    TEXT NOT NULL,
    pending_question TEXT NOT NULL,
    context_snapshot TEXT NOT NULL,
    created_at       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS provenance (
    prov_id      TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL,
    agent        TEXT NOT NULL,
    model_name   TEXT NOT NULL,
    quantization TEXT,
    sources      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
";

/// Shared SQLite handle. Connections are cheap to serialize behind a mutex
/// here: every operation is a single short statement or small transaction.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>, ClaimflowError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        log::info!("database ready at {}", path.display());
        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
        }))
    }

    pub fn open_in_memory() -> Result<Arc<Self>, ClaimflowError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
        }))
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-statement;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
