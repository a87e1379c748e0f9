// SPDX-License-Identifier: MIT

//! Provenance ledger
//!
//! Append-only audit trail of which responder, model and evidence sources
//! contributed to a session's answers. Rows are never updated or deleted.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{new_id, now, Db};
use crate::claimflow::error::ClaimflowError;
use crate::claimflow::state::SourceRef;

/// Persisted form of a provenance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProvenance {
    pub session_id: String,
    pub agent: String,
    pub model_name: String,
    pub quantization: Option<String>,
    pub sources: Vec<SourceRef>,
}

pub struct ProvenanceLedger {
    db: Arc<Db>,
}

impl ProvenanceLedger {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn append(
        &self,
        session_id: &str,
        agent: &str,
        model_name: &str,
        quantization: Option<&str>,
        sources: &[SourceRef],
    ) -> Result<(), ClaimflowError> {
        let sources_json = serde_json::to_string(sources)?;
        self.db.conn().execute(
            "INSERT INTO provenance (prov_id, session_id, agent, model_name, quantization, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![new_id(), session_id, agent, model_name, quantization, sources_json, now()],
        )?;
        Ok(())
    }

    /// All entries for a session in insertion order.
    pub fn list(&self, session_id: &str) -> Result<Vec<StoredProvenance>, ClaimflowError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT session_id, agent, model_name, quantization, sources
             FROM provenance WHERE session_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                let sources_json: String = row.get(4)?;
                Ok((
                    StoredProvenance {
                        session_id: row.get(0)?,
                        agent: row.get(1)?,
                        model_name: row.get(2)?,
                        quantization: row.get(3)?,
                        sources: Vec::new(),
                    },
                    sources_json,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut entry, sources_json)| {
                entry.sources = serde_json::from_str(&sources_json)?;
                Ok(entry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(doc_id: &str) -> SourceRef {
        SourceRef {
            file: "claims.json".into(),
            doc_id: Some(doc_id.into()),
            offsets: vec![],
            member_id: None,
        }
    }

    #[test]
    fn test_append_and_list_in_insertion_order() {
        let ledger = ProvenanceLedger::new(Db::open_in_memory().unwrap());

        ledger
            .append("s1", "benefit", "qwen", None, &[source("b1")])
            .unwrap();
        ledger
            .append("s1", "claim", "qwen", Some("int8"), &[source("c1")])
            .unwrap();
        ledger.append("s1", "summary", "qwen", None, &[]).unwrap();
        ledger
            .append("s2", "benefit", "qwen", None, &[source("x")])
            .unwrap();

        let rows = ledger.list("s1").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].agent, "benefit");
        assert_eq!(rows[1].agent, "claim");
        assert_eq!(rows[1].quantization.as_deref(), Some("int8"));
        assert_eq!(rows[2].agent, "summary");
        assert!(rows[2].sources.is_empty());
        assert_eq!(rows[0].sources[0].doc_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_list_unknown_session_is_empty() {
        let ledger = ProvenanceLedger::new(Db::open_in_memory().unwrap());
        assert!(ledger.list("nope").unwrap().is_empty());
    }
}
